//! Validator scenarios driven by a scripted engine session.
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use matecheck::chess::CoordMove;
use matecheck::uci::{Analysis, EngineInterface, SessionError};
use matecheck::verify::{DepthPolicy, PuzzleRecord, Validator};

/// Every analyze call a scripted engine received: the FEN it was given and the search depth.
type CallLog = Rc<RefCell<Vec<(String, u32)>>>;

/// An engine stand-in that replays a queue of prepared results and records what it was asked.
#[derive(Debug)]
struct ScriptedEngine {
    results: VecDeque<Result<Analysis, SessionError>>,
    calls: CallLog,
}

impl EngineInterface for ScriptedEngine {
    fn analyze(&mut self, fen: &str, depth: u32) -> Result<Analysis, SessionError> {
        self.calls.borrow_mut().push((fen.to_owned(), depth));
        self.results.pop_front().expect("validator made more engine calls than scripted")
    }

    fn shutdown(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}

fn scripted(results: Vec<Result<Analysis, SessionError>>) -> (ScriptedEngine, CallLog) {
    let calls: CallLog = Rc::new(RefCell::new(Vec::new()));
    let engine = ScriptedEngine {
        results: results.into(),
        calls: Rc::clone(&calls),
    };

    (engine, calls)
}

fn record(id: &str, fen: &str, moves: &str, mate_in: u32) -> PuzzleRecord {
    PuzzleRecord {
        id: id.to_owned(),
        fen: fen.to_owned(),
        moves: moves.to_owned(),
        rating: 1500,
        themes: format!("mate mateIn{}", mate_in),
        mate_in,
    }
}

/// An ordinary position: the engine has a move and sees no mate.
fn ongoing() -> Analysis {
    Analysis {
        best_move: Some("e2e4".parse::<CoordMove>().expect("valid move")),
        score_cp: Some(31),
        ..Analysis::default()
    }
}

/// A checkmated position: no reply, mate distance zero.
fn mated() -> Analysis {
    Analysis {
        best_move: None,
        forced_mate: true,
        mate_in: Some(0),
        ..Analysis::default()
    }
}

/// A stalemated position: no reply, but no mate score either.
fn stalemated() -> Analysis {
    Analysis {
        best_move: None,
        score_cp: Some(0),
        ..Analysis::default()
    }
}

/// A position where the side to move is being mated in `distance` no matter what it plays.
fn getting_mated(distance: i32) -> Analysis {
    Analysis {
        best_move: Some("g8f8".parse::<CoordMove>().expect("valid move")),
        forced_mate: true,
        mate_in: Some(distance),
        ..Analysis::default()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[test]
fn confirms_a_mate_in_one() {
    let (engine, calls) = scripted(vec![Ok(ongoing()), Ok(mated())]);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    let verdict = validator
        .validate(&record("m1", "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", "a1a8", 1))
        .expect("session stays healthy");

    assert!(verdict.valid);
    assert_eq!(verdict.reason, "confirmed mate in 1");

    // the starting position is probed at depth one, the mate confirmed deeper, and the final
    // position handed over reflects the applied rook move
    let calls = calls.borrow();
    assert_eq!(calls[0], ("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1".to_owned(), 1));
    assert_eq!(calls[1], ("R5k1/5ppp/8/8/8/8/5PPP/6K1 b - - 1 1".to_owned(), 10));
}

#[test]
fn rejects_an_already_finished_position() {
    let (engine, calls) = scripted(vec![Ok(mated())]);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    let verdict = validator
        .validate(&record("term", "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", "a1a8", 1))
        .expect("session stays healthy");

    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "position is already terminal before the first move");
    // the claimed moves were never consulted
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn rejects_a_stalemate_finish() {
    let (engine, _) = scripted(vec![Ok(ongoing()), Ok(stalemated())]);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    let verdict = validator
        .validate(&record("stale", "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", "a1a8", 1))
        .expect("session stays healthy");

    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "final position is not checkmate");
}

#[test]
fn rejects_a_final_position_with_a_reply() {
    let (engine, _) = scripted(vec![Ok(ongoing()), Ok(ongoing())]);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    let verdict = validator
        .validate(&record("reply", "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", "a1a7", 1))
        .expect("session stays healthy");

    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "final position is not checkmate");
}

#[test]
fn confirms_a_mate_in_three() {
    let (engine, calls) = scripted(vec![
        Ok(ongoing()),          // terminal probe
        Ok(getting_mated(-2)),  // after the first attacking move
        Ok(getting_mated(-1)),  // after the second attacking move
        Ok(mated()),            // after the mating move
    ]);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    let verdict = validator
        .validate(&record("m3", "6k1/5ppp/8/8/8/8/5PPP/RR4K1 w - - 0 1",
            "a1a7 g8f8 b1b7 f8e8 a7e7", 3))
        .expect("session stays healthy");

    assert!(verdict.valid, "rejected: {}", verdict.reason);
    assert_eq!(verdict.reason, "confirmed mate in 3");

    // the forced-mate checkpoints search to the scaled depth, the finish to the mate depth
    let depths: Vec<u32> = calls.borrow().iter().map(|(_, depth)| *depth).collect();
    assert_eq!(depths, vec![1, 15, 15, 10]);
}

#[test]
fn rejects_an_unforcing_middle_move() {
    let (engine, calls) = scripted(vec![
        Ok(ongoing()),
        Ok(getting_mated(-2)),
        // the second attacking move lets the defense escape
        Ok(ongoing()),
    ]);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    let verdict = validator
        .validate(&record("loose", "6k1/5ppp/8/8/8/8/5PPP/RR4K1 w - - 0 1",
            "a1a7 g8f8 b1b7 f8e8 a7e7", 3))
        .expect("session stays healthy");

    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "no forced mate after the attacking move at ply 3");
    // validation stops at the failed checkpoint
    assert_eq!(calls.borrow().len(), 3);
}

#[test]
fn rejects_a_mate_for_the_wrong_side() {
    // the engine reports a mate, but one the defense delivers
    let (engine, _) = scripted(vec![Ok(ongoing()), Ok(getting_mated(2))]);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    let verdict = validator
        .validate(&record("wrong-side", "6k1/5ppp/8/8/8/8/5PPP/RR4K1 w - - 0 1",
            "a1a7 g8f8 b1b7 f8e8 a7e7", 3))
        .expect("session stays healthy");

    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "no forced mate after the attacking move at ply 1");
}

#[test]
fn rejects_malformed_records_before_any_engine_work() {
    let cases = vec![
        (record("no-fen", "", "a1a8", 1),
            "invalid record: missing FEN"),
        (record("no-moves", "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", "  ", 1),
            "invalid record: missing move list"),
        (record("depth-zero", "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", "a1a8", 0),
            "invalid record: claimed mate depth is zero"),
        (record("short", "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", "a1a8", 2),
            "invalid record: move count does not match the claimed mate depth"),
        (record("bad-move", "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", "a1z9", 1),
            "illegal move a1z9 at ply 1"),
        (record("bad-fen", "6k1/5ppp/8/8/8/5PPP/R5K1 w - - 0 1", "a1a8", 1),
            "malformed FEN (cannot parse board)"),
        (record("no-king", "8/8/8/8/8/8/8/R5K1 w - - 0 1", "a1a8", 1),
            "malformed FEN (no king of the queried color)"),
    ];

    for (rec, reason) in cases {
        let (engine, calls) = scripted(vec![]);
        let mut validator = Validator::new(engine, DepthPolicy::default());

        let verdict = validator.validate(&rec).expect("session stays healthy");
        assert!(!verdict.valid, "{} was accepted", rec.id);
        assert_eq!(verdict.reason, reason, "wrong reason for {}", rec.id);
        assert!(calls.borrow().is_empty(), "{} reached the engine", rec.id);
    }
}

#[test]
fn rejects_a_move_from_an_empty_square() {
    // the move list parses, but nothing stands on the origin square
    let (engine, calls) = scripted(vec![Ok(ongoing())]);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    let verdict = validator
        .validate(&record("empty-origin", "4k3/8/8/8/8/8/8/4K3 w - - 0 1", "a1a2", 1))
        .expect("session stays healthy");

    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "illegal move a1a2 at ply 1");
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn escalates_session_failures_instead_of_rejecting() {
    let (engine, _) = scripted(vec![Err(SessionError::ProtocolTimeout)]);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    let result = validator
        .validate(&record("timeout", "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", "a1a8", 1));

    assert_eq!(result, Err(SessionError::ProtocolTimeout));
}

#[test]
fn scaled_depth_grows_with_deep_claims() {
    // a mate-in-7 claim needs 13 half-moves and deeper confirmation searches
    let mut results: Vec<Result<Analysis, SessionError>> = vec![Ok(ongoing())];
    for distance in &[-6, -5, -4, -3, -2, -1] {
        results.push(Ok(getting_mated(*distance)));
    }
    results.push(Ok(mated()));
    let (engine, calls) = scripted(results);
    let mut validator = Validator::new(engine, DepthPolicy::default());

    // shuffle the two kings around; only occupied origins matter to the model
    let moves = "e1e2 e8e7 e2e1 e7e8 e1e2 e8e7 e2e1 e7e8 e1e2 e8e7 e2e1 e7e8 e1e2";
    let verdict = validator
        .validate(&record("m7", "4k3/8/8/8/8/8/8/4K3 w - - 0 1", moves, 7))
        .expect("session stays healthy");

    assert!(verdict.valid, "rejected: {}", verdict.reason);
    let depths: Vec<u32> = calls.borrow().iter().map(|(_, depth)| *depth).collect();
    assert_eq!(depths, vec![1, 28, 28, 28, 28, 28, 28, 10]);
}
