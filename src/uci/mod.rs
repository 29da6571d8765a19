//! Talking to an external analysis engine over a line-oriented text protocol.
//!
//! The concrete protocol spellings live in a [`Dialect`](struct.Dialect.html) so the session is
//! not hardcoded to one vendor's vocabulary; the defaults are the standard UCI tokens. The
//! validator sees a session only through the [`EngineInterface`](trait.EngineInterface.html)
//! capability, so any conforming implementation can be substituted.
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use crate::chess::CoordMove;

pub mod io;

mod client;
pub use client::{Command, Dialect, Limits, Matcher, Response, UciClient};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A score carried by a streamed search-result line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Score {
    /// The score in centipawns.
    Cp(i32),
    /// A mate distance. If positive, the side to move delivers mate; if zero or negative, the
    /// side to move is being mated. The magnitude is in the engine's own convention and is not
    /// interpreted beyond its sign and whether it equals zero.
    MateIn(i32),
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The structured result of one analysis request.
///
/// While the engine streams result lines, later scores supersede earlier ones, so only the most
/// recent mate distance and the most recent centipawn value are retained.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Analysis {
    /// The engine's best move, or `None` when the engine reported that no legal move exists.
    ///
    /// `None` alone cannot tell checkmate from stalemate; combine it with the retained mate
    /// score to disambiguate.
    pub best_move: Option<CoordMove>,
    /// `true` if the engine reported a forced mate for this position.
    pub forced_mate: bool,
    /// The most recent mate distance, if any. See [`Score::MateIn`](enum.Score.html) for the
    /// sign convention.
    pub mate_in: Option<i32>,
    /// The most recent centipawn evaluation, if any.
    pub score_cp: Option<i32>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Failure of an engine session as a whole.
///
/// These are not per-record verdicts: once a session fails this way it must be torn down and a
/// fresh one launched.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The engine failed to produce an expected token within the line or time budget.
    ProtocolTimeout,
    /// Lost communication with the engine process.
    Io,
    /// The session was already poisoned or shut down.
    Closed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SessionError::*;

        match self {
            ProtocolTimeout => "engine did not produce the expected response in time",
            Io => "lost communication with the engine",
            Closed => "engine session is no longer usable",
        }.fmt(f)
    }
}

impl std::error::Error for SessionError { }

impl From<std::io::Error> for SessionError {
    fn from(_: std::io::Error) -> SessionError {
        SessionError::Io
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Trait for analysis-engine sessions.
///
/// One session owns one engine exclusively, and every call blocks the calling thread until the
/// engine answers or the session's budget runs out. Run independent sessions for parallelism.
pub trait EngineInterface {
    /// Resets the engine's game state, sets the position from `fen`, searches to `depth`, and
    /// returns the result once the engine's terminal best-move line arrives.
    fn analyze(&mut self, fen: &str, depth: u32) -> Result<Analysis, SessionError>;

    /// Terminates the engine and waits for it to exit. Idempotent, and safe to call once the
    /// session is already unusable.
    fn shutdown(&mut self) -> Result<(), SessionError>;
}
