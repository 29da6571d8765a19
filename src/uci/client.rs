//! Implements the client side of the engine protocol.
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::ffi::OsStr;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use log::warn;
use regex::Regex;
use serde::Deserialize;
use super::{io, Analysis, EngineInterface, Score, SessionError};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The token spellings of the engine's protocol.
///
/// The defaults are the standard UCI spellings. Any subset can be overridden, for instance from
/// a YAML file, to accommodate an engine with a nonstandard vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Dialect {
    /// The initialization command.
    pub init: String,
    /// The line acknowledging initialization.
    pub init_ack: String,
    /// The readiness probe command.
    pub ready_probe: String,
    /// The line acknowledging readiness.
    pub ready_ack: String,
    /// The command resetting the engine's internal game state.
    pub new_game: String,
    /// The command prefix that sets the position from a FEN string.
    pub set_position: String,
    /// The command prefix that starts a fixed-depth search.
    pub go_depth: String,
    /// The prefix of streamed search-result lines.
    pub info: String,
    /// The token introducing a score on a search-result line.
    pub score: String,
    /// The token marking a mate distance.
    pub mate: String,
    /// The token marking a centipawn score.
    pub centipawns: String,
    /// The prefix of the terminal best-move line.
    pub best_move: String,
    /// The best-move payload meaning no legal move exists.
    pub no_move: String,
    /// The termination command.
    pub quit: String,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect {
            init: "uci".to_owned(),
            init_ack: "uciok".to_owned(),
            ready_probe: "isready".to_owned(),
            ready_ack: "readyok".to_owned(),
            new_game: "ucinewgame".to_owned(),
            set_position: "position fen".to_owned(),
            go_depth: "go depth".to_owned(),
            info: "info".to_owned(),
            score: "score".to_owned(),
            mate: "mate".to_owned(),
            centipawns: "cp".to_owned(),
            best_move: "bestmove".to_owned(),
            no_move: "(none)".to_owned(),
            quit: "quit".to_owned(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Commands which can be sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Tells the engine to initialize for this protocol.
    ///
    /// ```text
    /// uci
    /// ```
    Init,

    /// Asks the engine to answer once it is ready for more input.
    ///
    /// ```text
    /// isready
    /// ```
    Probe,

    /// Resets the engine's internal game state.
    ///
    /// ```text
    /// ucinewgame
    /// ```
    NewGame,

    /// Sets the board to the given position.
    ///
    /// ```text
    /// position fen <fen>
    /// ```
    SetPosition(String),

    /// Searches the current position to the given depth.
    ///
    /// ```text
    /// go depth <depth>
    /// ```
    Search(u32),

    /// Tells the engine to exit.
    ///
    /// ```text
    /// quit
    /// ```
    Quit,
}

impl Command {
    /// Renders the command using the given dialect's token spellings.
    pub fn render(&self, dialect: &Dialect) -> String {
        use Command::*;

        match self {
            Init => dialect.init.clone(),
            Probe => dialect.ready_probe.clone(),
            NewGame => dialect.new_game.clone(),
            SetPosition(fen) => format!("{} {}", dialect.set_position, fen),
            Search(depth) => format!("{} {}", dialect.go_depth, depth),
            Quit => dialect.quit.clone(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Responses from the engine that the session cares about. Anything else on the channel is
/// skipped without being fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The acknowledgement of the initialization command.
    InitAck,
    /// The acknowledgement of a readiness probe.
    ReadyAck,
    /// A streamed search-result line carrying a score.
    Score(Score),
    /// The terminal line of a search: the best move's notation, or `None` if the engine
    /// reported that no legal move exists.
    BestMove(Option<String>),
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Classifies response lines according to one dialect's token spellings.
#[derive(Debug)]
pub struct Matcher {
    init_ack: String,
    ready_ack: String,
    info: String,
    mate: String,
    no_move: String,
    score_re: Regex,
    best_move_re: Regex,
}

impl Matcher {
    /// Compiles the line classifiers for the given dialect.
    pub fn new(dialect: &Dialect) -> Matcher {
        let score_re = Regex::new(&format!(r"\b{}\s+({}|{})\s+(-?\d+)",
            regex::escape(&dialect.score),
            regex::escape(&dialect.mate),
            regex::escape(&dialect.centipawns))).expect("INFALLIBLE");
        let best_move_re = Regex::new(&format!(r"^{}\s+(\S+)",
            regex::escape(&dialect.best_move))).expect("INFALLIBLE");

        Matcher {
            init_ack: dialect.init_ack.clone(),
            ready_ack: dialect.ready_ack.clone(),
            info: dialect.info.clone(),
            mate: dialect.mate.clone(),
            no_move: dialect.no_move.clone(),
            score_re,
            best_move_re,
        }
    }

    /// Classifies one line. Returns `None` for lines the session does not care about, which
    /// includes anything malformed.
    pub fn parse(&self, line: &str) -> Option<Response> {
        if line.starts_with(&self.init_ack) {
            Some(Response::InitAck)
        } else if line.starts_with(&self.ready_ack) {
            Some(Response::ReadyAck)
        } else if let Some(caps) = self.best_move_re.captures(line) {
            let token = caps.get(1).expect("INFALLIBLE").as_str();
            if token == self.no_move {
                Some(Response::BestMove(None))
            } else {
                Some(Response::BestMove(Some(token.to_owned())))
            }
        } else if line.starts_with(&self.info) {
            let caps = self.score_re.captures(line)?;
            let value: i32 = caps.get(2).expect("INFALLIBLE").as_str().parse().ok()?;
            if caps.get(1).expect("INFALLIBLE").as_str() == self.mate {
                Some(Response::Score(Score::MateIn(value)))
            } else {
                Some(Response::Score(Score::Cp(value)))
            }
        } else {
            None
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Bounds on how long the session waits for expected protocol tokens.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Limits {
    /// The maximum number of lines consumed while waiting for an expected token.
    pub line_budget: usize,
    /// The maximum time to wait for any single line.
    pub line_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            line_budget: 4096,
            line_timeout: Duration::from_secs(60),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A session with one external analysis engine.
///
/// The session owns its engine process exclusively for its whole lifetime. It is released on
/// every exit path: [`shutdown`](trait.EngineInterface.html#tymethod.shutdown) is idempotent and
/// dropping the session performs a best-effort shutdown. Once a request runs out of its line or
/// time budget the session is poisoned and every later request fails with
/// [`SessionError::Closed`](enum.SessionError.html).
#[derive(Debug)]
pub struct UciClient {
    engine: io::Engine,
    dialect: Dialect,
    matcher: Matcher,
    limits: Limits,
    poisoned: bool,
    shut_down: bool,
}

impl UciClient {
    /// Launches the engine process and performs the protocol handshake: initialization command,
    /// acknowledgement, readiness probe, readiness acknowledgement.
    pub fn launch<T, U>(cmd: T, args: &[U], name: &str, dialect: Dialect, limits: Limits)
    -> Result<Self, SessionError> where T: AsRef<OsStr>, U: AsRef<OsStr> {
        let engine = io::Engine::launch(cmd, args, name)?;
        let matcher = Matcher::new(&dialect);
        let mut client = UciClient {
            engine,
            dialect,
            matcher,
            limits,
            poisoned: false,
            shut_down: false,
        };

        client.send(&Command::Init)?;
        client.wait_for(&Response::InitAck)?;
        client.send(&Command::Probe)?;
        client.wait_for(&Response::ReadyAck)?;

        Ok(client)
    }

    /// Sends a command to the engine.
    fn send(&mut self, cmd: &Command) -> Result<(), SessionError> {
        self.engine.send(&cmd.render(&self.dialect))?;
        Ok(())
    }

    /// Retrieves the next line, poisoning the session if the engine goes quiet or away.
    fn recv(&mut self) -> Result<String, SessionError> {
        match self.engine.recv_timeout(self.limits.line_timeout) {
            Ok(line) => Ok(line),
            Err(RecvTimeoutError::Timeout) => {
                self.poisoned = true;
                Err(SessionError::ProtocolTimeout)
            },
            Err(RecvTimeoutError::Disconnected) => {
                self.poisoned = true;
                Err(SessionError::Io)
            },
        }
    }

    /// Consumes lines until the expected response arrives. Unrelated lines are skipped; running
    /// out of the line budget poisons the session.
    fn wait_for(&mut self, expected: &Response) -> Result<(), SessionError> {
        for _ in 0..self.limits.line_budget {
            let line = self.recv()?;
            if self.matcher.parse(&line).as_ref() == Some(expected) {
                return Ok(());
            }
        }

        self.poisoned = true;
        Err(SessionError::ProtocolTimeout)
    }
}

impl EngineInterface for UciClient {
    fn analyze(&mut self, fen: &str, depth: u32) -> Result<Analysis, SessionError> {
        if self.poisoned || self.shut_down {
            return Err(SessionError::Closed);
        }

        self.send(&Command::NewGame)?;
        self.send(&Command::SetPosition(fen.to_owned()))?;
        self.send(&Command::Search(depth))?;

        let mut analysis = Analysis::default();
        for _ in 0..self.limits.line_budget {
            let line = self.recv()?;
            match self.matcher.parse(&line) {
                Some(Response::Score(Score::MateIn(distance))) => {
                    analysis.forced_mate = true;
                    analysis.mate_in = Some(distance);
                },
                Some(Response::Score(Score::Cp(value))) => {
                    analysis.score_cp = Some(value);
                },
                Some(Response::BestMove(None)) => {
                    analysis.best_move = None;
                    return Ok(analysis);
                },
                Some(Response::BestMove(Some(token))) => {
                    match token.parse() {
                        Ok(mv) => {
                            analysis.best_move = Some(mv);
                            return Ok(analysis);
                        },
                        // an unintelligible terminal line is skipped like any other
                        Err(_) => warn!("skipping unparseable best move {:?}", token),
                    }
                },
                _ => { },
            }
        }

        self.poisoned = true;
        Err(SessionError::ProtocolTimeout)
    }

    fn shutdown(&mut self) -> Result<(), SessionError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let quit = Command::Quit.render(&self.dialect);
        let _ = self.engine.send(&quit);
        if self.poisoned {
            // a hung engine will not honor quit
            let _ = self.engine.kill();
        }
        self.engine.wait()?;

        Ok(())
    }
}

impl Drop for UciClient {
    /// Releases the engine process even when the session is dropped early.
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
