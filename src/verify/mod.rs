//! Validates that a claimed mate-in-N puzzle actually forces mate.
//!
//! The validator drives the position model through the claimed move sequence and asks the
//! analysis engine to confirm, at every checkpoint, that the claim still holds: the starting
//! position is not already finished, every attacking move keeps the defense in a forced mate,
//! and the final position is a checkmate rather than a stalemate.
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use log::info;
use serde::{Deserialize, Serialize};
use crate::chess::{self, Color, CoordMove, Position};
use crate::uci::{EngineInterface, SessionError};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// One puzzle record as supplied by the surrounding tooling.
///
/// Records are constructed elsewhere, consumed once by
/// [`Validator::validate`](struct.Validator.html#method.validate), and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PuzzleRecord {
    /// The record's identifier.
    pub id: String,
    /// The starting position in FEN.
    pub fen: String,
    /// The claimed solution, as space-separated coordinate moves.
    pub moves: String,
    /// The puzzle's claimed rating.
    #[serde(default)]
    pub rating: u32,
    /// The puzzle's theme tags.
    #[serde(default)]
    pub themes: String,
    /// The claimed mate depth, in attacker moves.
    pub mate_in: u32,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The verdict for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// The record's identifier.
    pub id: String,
    /// `true` if the claimed mate was confirmed.
    pub valid: bool,
    /// The human-readable reason for the verdict.
    pub reason: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The reasons a record can be rejected.
///
/// Every rejected record carries one of these, so nothing is dropped silently. Session-level
/// failures are *not* rejections; they escalate as
/// [`SessionError`](../uci/enum.SessionError.html) instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The starting FEN fails structural decode, or lacks a king.
    MalformedFen(chess::error::Error),
    /// A claimed move is malformed, or its origin square is empty.
    IllegalMove {
        /// The one-based half-move at fault.
        ply: usize,
        /// The offending move text.
        notation: String,
    },
    /// The record is missing required data or is internally inconsistent.
    InvalidRecord(&'static str),
    /// The starting position already has no legal move.
    AlreadyTerminal,
    /// The final position is not a confirmed checkmate.
    NotCheckmate,
    /// An intermediate attacking move is not confirmed as forcing mate.
    NoForcedMate {
        /// The one-based half-move after which confirmation failed.
        ply: usize,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Rejection::*;

        match self {
            MalformedFen(err) => write!(f, "malformed FEN ({})", err),
            IllegalMove { ply, notation } =>
                write!(f, "illegal move {} at ply {}", notation, ply),
            InvalidRecord(what) => write!(f, "invalid record: {}", what),
            AlreadyTerminal =>
                "position is already terminal before the first move".fmt(f),
            NotCheckmate => "final position is not checkmate".fmt(f),
            NoForcedMate { ply } =>
                write!(f, "no forced mate after the attacking move at ply {}", ply),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Search-depth configuration for the engine queries.
///
/// Deeper mate claims need deeper confirmation searches. The scaling is policy, not a
/// correctness invariant, so every knob is exposed rather than hardcoded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DepthPolicy {
    /// Depth of the already-terminal probe on the starting position. One ply suffices, since
    /// only the presence of a legal move matters there.
    pub probe: u32,
    /// Depth used to confirm the final position is a checkmate. Must stay well above one, or a
    /// shallow search can miss the mate score.
    pub mate: u32,
    /// Minimum depth used to confirm a forced mate after an attacking move.
    pub forced_base: u32,
    /// Additional confirmation depth per claimed mate move.
    pub forced_per_move: u32,
}

impl DepthPolicy {
    /// Returns the depth used to confirm forced mate for a claim of mate in `mate_in`.
    pub fn forced_depth(&self, mate_in: u32) -> u32 {
        self.forced_base.max(mate_in * self.forced_per_move)
    }
}

impl Default for DepthPolicy {
    fn default() -> Self {
        DepthPolicy {
            probe: 1,
            mate: 10,
            forced_base: 15,
            forced_per_move: 4,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Drives one engine session through puzzle records, one at a time.
///
/// The validator owns its session for the session's whole lifetime, so dropping the validator
/// releases the engine process.
#[derive(Debug)]
pub struct Validator<E: EngineInterface> {
    engine: E,
    policy: DepthPolicy,
}

impl<E: EngineInterface> Validator<E> {
    /// Creates a validator that owns the given engine session.
    pub fn new(engine: E, policy: DepthPolicy) -> Self {
        Validator { engine, policy }
    }

    /// Validates one record.
    ///
    /// Record-level failures are captured as the reason of a negative verdict and the session
    /// stays usable for the next record. Only session-level failures escalate as errors; after
    /// one of those the session must be torn down and replaced.
    pub fn validate(&mut self, record: &PuzzleRecord) -> Result<Verdict, SessionError> {
        let verdict = match self.confirm(record)? {
            Ok(()) => {
                info!("{}: confirmed mate in {}", record.id, record.mate_in);
                Verdict {
                    id: record.id.clone(),
                    valid: true,
                    reason: format!("confirmed mate in {}", record.mate_in),
                }
            },
            Err(rejection) => {
                info!("{}: rejected: {}", record.id, rejection);
                Verdict {
                    id: record.id.clone(),
                    valid: false,
                    reason: rejection.to_string(),
                }
            },
        };

        Ok(verdict)
    }

    /// Runs the record through every checkpoint. The outer error is a session failure, the
    /// inner one a rejection of the record itself.
    fn confirm(&mut self, record: &PuzzleRecord)
    -> Result<std::result::Result<(), Rejection>, SessionError> {
        use Rejection::*;

        // fail fast on the record's own shape before any engine work
        if record.fen.trim().is_empty() {
            return Ok(Err(InvalidRecord("missing FEN")));
        }
        if record.moves.trim().is_empty() {
            return Ok(Err(InvalidRecord("missing move list")));
        }
        if record.mate_in == 0 {
            return Ok(Err(InvalidRecord("claimed mate depth is zero")));
        }

        // the attacker moves N times, the defense answers N-1 times
        let tokens: Vec<&str> = record.moves.split_whitespace().collect();
        if tokens.len() != 2*record.mate_in as usize - 1 {
            return Ok(Err(InvalidRecord("move count does not match the claimed mate depth")));
        }

        let mut moves = Vec::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            match token.parse::<CoordMove>() {
                Ok(mv) => moves.push(mv),
                Err(_) => return Ok(Err(IllegalMove {
                    ply: i + 1,
                    notation: (*token).to_owned(),
                })),
            }
        }

        let mut pos: Position = match record.fen.parse() {
            Ok(pos) => pos,
            Err(err) => return Ok(Err(MalformedFen(err))),
        };
        // a position without both kings is corrupt data, not a puzzle
        for &color in &[Color::White, Color::Black] {
            if let Err(err) = pos.king_square(color) {
                return Ok(Err(MalformedFen(err)));
            }
        }

        // a puzzle may not start in an already-finished position
        let probe = self.engine.analyze(&pos.to_fen_str(), self.policy.probe)?;
        if probe.best_move.is_none() || probe.mate_in == Some(0) {
            return Ok(Err(AlreadyTerminal));
        }

        let last = moves.len() - 1;
        for (i, mv) in moves.iter().enumerate() {
            pos = match pos.apply(mv) {
                Ok(next) => next,
                Err(_) => return Ok(Err(IllegalMove {
                    ply: i + 1,
                    notation: mv.to_string(),
                })),
            };

            if i == last {
                // the defense must have no reply, and must be mated rather than stalemated,
                // which the terminal line alone cannot tell apart
                let analysis = self.engine.analyze(&pos.to_fen_str(), self.policy.mate)?;
                if analysis.best_move.is_some() || analysis.mate_in != Some(0) {
                    return Ok(Err(NotCheckmate));
                }
            } else if i % 2 == 0 {
                // after each attacking move the defense, now on move, must still be getting
                // mated no matter what it plays
                let depth = self.policy.forced_depth(record.mate_in);
                let analysis = self.engine.analyze(&pos.to_fen_str(), depth)?;
                if !analysis.forced_mate || analysis.mate_in.map_or(true, |d| d > 0) {
                    return Ok(Err(NoForcedMate { ply: i + 1 }));
                }
            }
        }

        Ok(Ok(()))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_depth_scales_with_the_claim() {
        let policy = DepthPolicy::default();

        // shallow claims use the base depth, deep claims scale past it
        assert_eq!(policy.forced_depth(1), 15);
        assert_eq!(policy.forced_depth(3), 15);
        assert_eq!(policy.forced_depth(4), 16);
        assert_eq!(policy.forced_depth(7), 28);
    }

    #[test]
    fn puzzle_records_deserialize_from_yaml() {
        let record: PuzzleRecord = serde_yaml::from_str(
            "id: '00sHx'\n\
             fen: 6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1\n\
             moves: a1a8\n\
             rating: 1204\n\
             themes: mate mateIn1 oneMove\n\
             mate_in: 1\n").expect("valid record yaml");

        assert_eq!(record.id, "00sHx");
        assert_eq!(record.mate_in, 1);
        assert_eq!(record.moves, "a1a8");
    }

    #[test]
    fn optional_record_fields_default() {
        let record: PuzzleRecord = serde_yaml::from_str(
            "id: x\nfen: 4k3/8/8/8/8/8/8/4K3 w - - 0 1\nmoves: e1e2\nmate_in: 1\n")
            .expect("valid record yaml");

        assert_eq!(record.rating, 0);
        assert_eq!(record.themes, "");
    }

    #[test]
    fn rejection_reasons_name_the_fault() {
        assert_eq!(Rejection::AlreadyTerminal.to_string(),
            "position is already terminal before the first move");
        assert_eq!(Rejection::NoForcedMate { ply: 3 }.to_string(),
            "no forced mate after the attacking move at ply 3");
        assert_eq!(
            Rejection::IllegalMove { ply: 2, notation: "e9e4".to_owned() }.to_string(),
            "illegal move e9e4 at ply 2");
    }
}
