//! Handles the line-oriented input and output with an engine process.
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use log::{debug, error, info};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A line-oriented channel to a launched engine process. All traffic is logged using the log
/// crate (assuming a logger is set up): sent lines at info, received lines at debug.
#[derive(Debug)]
pub struct Engine {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    name: String,
}

impl Engine {
    /// Launches the engine process and starts a thread reading its output.
    pub fn launch<T, U>(cmd: T, args: &[U], name: &str) -> std::io::Result<Self>
    where T: AsRef<OsStr>, U: AsRef<OsStr> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        // both pipes were requested above, so they are present
        let stdin = child.stdin.take().expect("INFALLIBLE");
        let stdout = child.stdout.take().expect("INFALLIBLE");

        let (sender, receiver) = channel();
        let reader_name = name.to_owned();
        thread::spawn(move || {
            Self::thread(stdout, sender, &reader_name);
        });

        Ok(Engine {
            child,
            stdin,
            lines: receiver,
            name: name.to_owned(),
        })
    }

    /// Sends a line to the engine.
    pub fn send(&mut self, s: &str) -> std::io::Result<()> {
        info!("[{}] send: {}", self.name, s);
        writeln!(self.stdin, "{}", s)?;
        self.stdin.flush()
    }

    /// Retrieves a line from the engine, waiting no longer than `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<String, RecvTimeoutError> {
        self.lines.recv_timeout(timeout)
    }

    /// Kills the engine process instead of waiting for it to exit on its own.
    pub fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill()
    }

    /// Waits for the engine process to exit and reaps it.
    pub fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait()
    }

    /// A function run in a separate thread to read the engine's output.
    fn thread(stdout: ChildStdout, sender: Sender<String>, name: &str) {
        let mut reader = BufReader::new(stdout);

        loop {
            let mut line = String::new();

            match reader.read_line(&mut line) {
                // the engine closed its end
                Ok(0) => break,
                Ok(_) => { },
                Err(err) => {
                    error!("[{}] io error: {}", name, err);
                    break;
                },
            }

            let line = line.trim().to_string();
            debug!("[{}] recv: {}", name, line);
            if sender.send(line).is_err() {
                // the session dropped its receiver
                break;
            }
        }
    }
}
