//! Contains the `Position` structure
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use std::str::FromStr;
use super::*;

use Color::*;
use Piece::*;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A representation of the arrangement of pieces on the board at a given point in the game, as well
/// as the side to move, castling availability, en-passant legality, and the move counters.
///
/// `Position` is an immutable value: [`apply`](#method.apply) returns a brand-new position and
/// leaves its argument untouched, so intermediate positions can be retained freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    board: [Option<(Color, Piece)>; Square::COUNT],
    turn: Color,
    castling_rights: [u8; Color::COUNT],
    ep_square: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

const CASTLE_KING_SIDE: u8 = 0x1;
const CASTLE_QUEEN_SIDE: u8 = 0x2;
const CASTLE_BOTH_SIDES: u8 = CASTLE_KING_SIDE | CASTLE_QUEEN_SIDE;

/// The rook home squares whose occupants carry a castling right.
const ROOK_HOMES: [(Color, (u8, u8), u8); 4] = [
    (White, (0, 0), CASTLE_QUEEN_SIDE),
    (White, (7, 0), CASTLE_KING_SIDE),
    (Black, (0, 7), CASTLE_QUEEN_SIDE),
    (Black, (7, 7), CASTLE_KING_SIDE),
];

const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl Position {

    /// Returns the standard starting Position
    pub fn new() -> Position {
        STARTING_FEN.parse().expect("INFALLIBLE")
    }

    /// Parse a position from a FEN string
    ///
    /// Only the board field is required. The remaining fields default to white to move, no
    /// castling rights, no en-passant square, a zero half-move clock, and move number one.
    pub fn from_fen_str(s: &str) -> Result<Position> {
        let mut pos = Position {
            board: [None; Square::COUNT],
            turn: White,
            castling_rights: [0, 0],
            ep_square: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        };
        let mut fields = s.trim().split_whitespace();

        // parse the board
        let board = fields.next().ok_or(Error::EmptyFen)?;
        let ranks: Vec<&str> = board.split('/').collect();
        if ranks.len() != 8 {
            return Err(Error::ParseBoard);
        }
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file = 0u8;
            for c in rank_str.chars() {
                match c {
                    '1'..='8' => {
                        file += c as u8 - b'0';
                    },
                    _ => {
                        let (color, piece) = Piece::from_fen_letter(c)
                            .ok_or(Error::ParseBoard)?;
                        if file >= 8 {
                            return Err(Error::ParseBoard);
                        }
                        pos.board[Square::from_coord(file, rank).index()] = Some((color, piece));
                        file += 1;
                    },
                }
                if file > 8 {
                    return Err(Error::ParseBoard);
                }
            }
            if file != 8 {
                return Err(Error::ParseBoard);
            }
        }

        // parse the turn, if present
        if let Some(turn) = fields.next() {
            pos.turn = turn.parse()?;
        }

        // parse the castling flags, if present
        match fields.next() {
            Some("-") | None => { },
            Some(castling_flags) => {
                for c in castling_flags.chars() {
                    match c {
                        'K' => pos.castling_rights[White as usize] |= CASTLE_KING_SIDE,
                        'Q' => pos.castling_rights[White as usize] |= CASTLE_QUEEN_SIDE,
                        'k' => pos.castling_rights[Black as usize] |= CASTLE_KING_SIDE,
                        'q' => pos.castling_rights[Black as usize] |= CASTLE_QUEEN_SIDE,
                        _ => return Err(Error::ParseCastling),
                    }
                }
            },
        }

        // parse the en-passant square, if present
        match fields.next() {
            Some("-") | None => { },
            Some(ep_square) => {
                pos.ep_square = Some(ep_square.parse().map_err(|_| Error::ParseEnPassant)?);
            },
        }

        // parse the half-move clock, if present
        if let Some(plies) = fields.next() {
            pos.halfmove_clock = plies.parse().map_err(|_| Error::ParseHalfMoveClock)?;
        }

        // parse the move number, if present
        if let Some(move_num) = fields.next() {
            pos.fullmove_number = move_num.parse().map_err(|_| Error::ParseMoveNumber)?;
        }

        Ok(pos)
    }

    /// Converts the position to a FEN string
    pub fn to_fen_str(&self) -> String {
        // the board
        let mut board = String::new();
        for rank in (0..8u8).rev() {
            let mut count = 0;
            for file in 0..8u8 {
                if let Some((color, piece)) = self.piece_at(Square::from_coord(file, rank)) {
                    if count > 0 {
                        board += &count.to_string();
                        count = 0;
                    }
                    board.push(piece.to_fen_letter(color));
                } else {
                    count += 1;
                }
            }
            if count > 0 {
                board += &count.to_string();
            }
            if rank > 0 {
                board += "/";
            }
        }

        // castling rights
        let mut castling = String::new();
        castling += match self.castling_rights[White as usize] {
            CASTLE_KING_SIDE => "K",
            CASTLE_QUEEN_SIDE => "Q",
            CASTLE_BOTH_SIDES => "KQ",
            _ => "",
        };
        castling += match self.castling_rights[Black as usize] {
            CASTLE_KING_SIDE => "k",
            CASTLE_QUEEN_SIDE => "q",
            CASTLE_BOTH_SIDES => "kq",
            _ => "",
        };
        if castling.is_empty() {
            castling += "-";
        }

        // en-passant square
        let ep_square = match self.ep_square {
            Some(sq) => sq.to_string(),
            None => "-".to_string(),
        };

        format!("{} {} {} {} {} {}", board, self.turn, castling, ep_square,
                                     self.halfmove_clock, self.fullmove_number)
    }

    /// Applies one half-move in coordinate notation, returning the resulting position.
    ///
    /// The move is trusted to be well-formed chess: the model reconstructs its effect (including
    /// castling, en-passant capture, promotion, and the move counters) but does not verify
    /// legality beyond requiring an occupied origin square.
    pub fn apply(&self, mv: &CoordMove) -> Result<Position> {
        // the mover is whatever stands on the origin square
        let (color, piece) = self.piece_at(mv.orig).ok_or(Error::IllegalMove)?;

        // state that must be observed before any derived field changes
        let captured = self.piece_at(mv.dest);
        let ep_target = self.ep_square;

        let mut pos = self.clone();

        // lift the piece, promoting it in flight if a promotion letter was given
        pos.board[mv.orig.index()] = None;
        let placed = mv.promotion.unwrap_or(piece);

        // a king moving two files is castling and brings the rook across
        if piece == King && (i16::from(mv.dest.file()) - i16::from(mv.orig.file())).abs() == 2 {
            let rank = mv.orig.rank();
            let (rook_orig, rook_dest) = if mv.dest.file() > mv.orig.file() {
                (Square::from_coord(7, rank), Square::from_coord(5, rank))
            } else {
                (Square::from_coord(0, rank), Square::from_coord(3, rank))
            };
            pos.board[rook_dest.index()] = pos.board[rook_orig.index()].take();
        }

        // en passant: the captured pawn stands on the origin's rank and the destination's file,
        // not on the destination square
        if piece == Pawn && Some(mv.dest) == ep_target {
            pos.board[Square::from_coord(mv.dest.file(), mv.orig.rank()).index()] = None;
        }

        pos.board[mv.dest.index()] = Some((color, placed));

        pos.turn = !self.turn;

        // castling rights observe the pre-move mover and the pre-move capture square
        if piece == King {
            pos.castling_rights[color as usize] = 0;
        }
        for &(side, (file, rank), right) in &ROOK_HOMES {
            let home = Square::from_coord(file, rank);
            if (piece == Rook && color == side && mv.orig == home)
                || (captured == Some((side, Rook)) && mv.dest == home) {
                pos.castling_rights[side as usize] &= !right;
            }
        }

        // a two-square pawn advance exposes the square it passed over
        pos.ep_square = if piece == Pawn
            && (i16::from(mv.dest.rank()) - i16::from(mv.orig.rank())).abs() == 2 {
            Some(Square::from_coord(mv.dest.file(), (mv.orig.rank() + mv.dest.rank())/2))
        } else {
            None
        };

        // the half-move clock resets on any pawn move or capture
        if piece == Pawn || captured.is_some() {
            pos.halfmove_clock = 0;
        } else {
            pos.halfmove_clock += 1;
        }
        if self.turn == Black {
            pos.fullmove_number += 1;
        }

        Ok(pos)
    }

    /// Returns the color whose turn it is
    pub fn turn(&self) -> Color {
        self.turn
    }

    /// Returns the color and type of piece, if any, at the given location
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        self.board[sq.index()]
    }

    /// Returns the square where the king of the given color is located.
    ///
    /// A position with no king of the queried color is a data error, not a legal state, so the
    /// lookup fails explicitly rather than defaulting.
    pub fn king_square(&self, color: Color) -> Result<Square> {
        for file in 0..8 {
            for rank in 0..8 {
                let sq = Square::from_coord(file, rank);
                if self.piece_at(sq) == Some((color, King)) {
                    return Ok(sq);
                }
            }
        }

        Err(Error::MissingKing)
    }

    /// Returns the en-passant capture square, if any
    pub fn en_passant_square(&self) -> Option<Square> {
        self.ep_square
    }

    /// Returns `true` if the given color can still castle king-side
    pub fn has_king_side_castling_rights(&self, color: Color) -> bool {
        self.castling_rights[color as usize] & CASTLE_KING_SIDE != 0
    }

    /// Returns `true` if the given color can still castle queen-side
    pub fn has_queen_side_castling_rights(&self, color: Color) -> bool {
        self.castling_rights[color as usize] & CASTLE_QUEEN_SIDE != 0
    }

    /// Returns the number of half-moves since the last capture or pawn advance
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    /// Returns the full-move number, which starts at one and increments after black moves
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }
}

impl Default for Position {
    /// Returns the standard starting Position
    fn default() -> Self {
        Position::new()
    }
}

impl fmt::Display for Position {
    /// Writes out the position using FEN
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_fen_str().fmt(f)
    }
}

impl FromStr for Position {
    type Err = Error;

    /// Parse a position from a FEN string
    fn from_str(s: &str) -> Result<Self> {
        Position::from_fen_str(s)
    }
}
