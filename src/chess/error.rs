//! Defines the error types needed by the chess module
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Error type used by methods in the `chess` module
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The FEN string is empty or contains no board field
    EmptyFen,
    /// Cannot parse the board field of a FEN string
    ParseBoard,
    /// Cannot parse the side-to-move field of a FEN string
    ParseTurn,
    /// Cannot parse the castling field of a FEN string
    ParseCastling,
    /// Cannot parse the en-passant field of a FEN string
    ParseEnPassant,
    /// Cannot parse the half-move clock field of a FEN string
    ParseHalfMoveClock,
    /// Cannot parse the full-move number field of a FEN string
    ParseMoveNumber,
    /// Cannot parse a square or coordinate move string
    ParseMove,
    /// The move's origin square is empty
    IllegalMove,
    /// The position has no king of the queried color
    MissingKing,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;

        match self {
            EmptyFen => "empty FEN string",
            ParseBoard => "cannot parse board",
            ParseTurn => "cannot parse side to move",
            ParseCastling => "cannot parse castling rights",
            ParseEnPassant => "cannot parse en-passant square",
            ParseHalfMoveClock => "cannot parse half-move clock",
            ParseMoveNumber => "cannot parse move number",
            ParseMove => "cannot parse move",
            IllegalMove => "no piece on the move's origin square",
            MissingKing => "no king of the queried color",
        }.fmt(f)
    }
}

impl std::error::Error for Error { }

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Result type used by methods in the `chess` module
pub type Result<T> = std::result::Result<T, Error>;
