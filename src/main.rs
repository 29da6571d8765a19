//! Command-line driver that validates a file of mate-in-N puzzle records.
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
#![warn(missing_debug_implementations, unused_extern_crates)]
#![warn(clippy::unimplemented, clippy::option_unwrap_used, clippy::result_unwrap_used)]

use std::fs::{read_to_string, write, File};
use std::path::PathBuf;
use std::thread;
use clap::{App, Arg, crate_version};
use chrono::Local;
use log::error;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use simplelog::{WriteLogger, LevelFilter, Config};
use matecheck::uci::{Dialect, Limits, UciClient};
use matecheck::verify::{DepthPolicy, PuzzleRecord, Validator, Verdict};

fn main() -> Result<(), Error> {
    let matches =
        App::new("matecheck")
            .version(crate_version!())
            .about("Validates claimed mate-in-N chess puzzles against an external \
                    analysis engine.")
            .arg(Arg::with_name("puzzles")
                .value_name("PUZZLE_FILE")
                .required(true)
                .help("YAML (or JSON) file containing the puzzle records to validate"))
            .arg(Arg::with_name("engine")
                .long("engine")
                .short("e")
                .value_name("EXECUTABLE")
                .takes_value(true)
                .required(true)
                .help("The analysis engine's executable"))
            .arg(Arg::with_name("engine-args")
                .long("engine-arg")
                .value_name("ARGUMENT")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("An argument to pass to the engine (may be repeated)"))
            .arg(Arg::with_name("dialect")
                .long("dialect")
                .value_name("FILE")
                .takes_value(true)
                .help("YAML file overriding the engine's protocol token spellings"))
            .arg(Arg::with_name("output")
                .long("output")
                .short("o")
                .value_name("FILE")
                .takes_value(true)
                .help("Writes the validation results to FILE as YAML"))
            .arg(Arg::with_name("jobs")
                .long("jobs")
                .short("j")
                .value_name("N")
                .takes_value(true)
                .default_value("1")
                .help("Number of parallel validation sessions, each owning its own \
                       engine process"))
            .arg(Arg::with_name("sample")
                .long("sample")
                .value_name("N")
                .takes_value(true)
                .help("Validates a random sample of N records instead of the whole file"))
            .arg(Arg::with_name("mate-depth")
                .long("mate-depth")
                .value_name("DEPTH")
                .takes_value(true)
                .default_value("10")
                .help("Search depth used to confirm that the final position is checkmate"))
            .arg(Arg::with_name("forced-depth")
                .long("forced-depth")
                .value_name("DEPTH")
                .takes_value(true)
                .default_value("15")
                .help("Minimum search depth used to confirm a forced mate after an \
                       attacking move"))
            .arg(Arg::with_name("forced-depth-scale")
                .long("forced-depth-scale")
                .value_name("PLIES")
                .takes_value(true)
                .default_value("4")
                .help("Additional confirmation depth per claimed mate move"))
            .arg(Arg::with_name("log")
                .long("log")
                .short("l")
                .help("Turns on logging"))
            .arg(Arg::with_name("log-file")
                .long("log-file")
                .value_name("LOG_FILE")
                .takes_value(true)
                .default_value("matecheck.log")
                .help("Sets the log file if logging is turned on"))
            .arg(Arg::with_name("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .takes_value(true)
                .default_value("info")
                .help("Sets the log level if logging is turned on"))
            .get_matches();

    let log_file = PathBuf::from(matches.value_of_os("log-file").expect("INFALLIBLE"));
    let log_level = match matches.value_of("log-level") {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        Some(level) => return Err(Error(format!("{}: invalid log level", level))),
        None => unreachable!(),
    };
    let _logger = if matches.is_present("log") {
        WriteLogger::init(
            log_level,
            Config::default(),
            File::create(&log_file).map_err(|err| {
                Error(format!("{}: {}", log_file.display(), err))
            })?)
    } else {
        WriteLogger::init(LevelFilter::Off, Config::default(), std::io::sink())
    };

    let engine = matches.value_of("engine").expect("INFALLIBLE").to_owned();
    let engine_args: Vec<String> = matches.values_of("engine-args")
        .map(|args| args.map(|s| s.to_owned()).collect())
        .unwrap_or_default();

    let dialect = match matches.value_of("dialect") {
        Some(path) => serde_yaml::from_str(&read_to_string(path)?)?,
        None => Dialect::default(),
    };

    let mut policy = DepthPolicy::default();
    policy.mate = parse_number(&matches, "mate-depth")?;
    policy.forced_base = parse_number(&matches, "forced-depth")?;
    policy.forced_per_move = parse_number(&matches, "forced-depth-scale")?;

    let jobs: usize = parse_number(&matches, "jobs")?;
    if jobs == 0 {
        return Err(Error("at least one job is required".to_owned()));
    }

    // load the records
    let puzzle_path = matches.value_of("puzzles").expect("INFALLIBLE");
    let file: PuzzleFile = serde_yaml::from_str(&read_to_string(puzzle_path)?)?;
    let mut records = file.puzzles;
    println!("Loaded {} puzzles from {}", records.len(), puzzle_path);

    if let Some(n) = matches.value_of("sample") {
        let n: usize = n.parse()
            .map_err(|_| Error("sample size must be numeric".to_owned()))?;
        records.shuffle(&mut rand::thread_rng());
        records.truncate(n);
        println!("Validating a random sample of {} records", records.len());
    }

    // run one worker per job, each owning its own engine process
    let verdicts = if records.is_empty() {
        Vec::new()
    } else if jobs == 1 {
        validate_chunk(&records, &engine, &engine_args, "engine", &dialect, policy)?
    } else {
        let chunk_size = 1.max((records.len() + jobs - 1)/jobs);
        let mut handles = Vec::new();
        for (index, chunk) in records.chunks(chunk_size).enumerate() {
            let chunk = chunk.to_vec();
            let engine = engine.clone();
            let engine_args = engine_args.clone();
            let dialect = dialect.clone();
            let name = format!("engine-{}", index);

            handles.push(thread::spawn(move || {
                validate_chunk(&chunk, &engine, &engine_args, &name, &dialect, policy)
            }));
        }

        let mut all = Vec::with_capacity(records.len());
        for handle in handles {
            let chunk_verdicts = handle.join()
                .map_err(|_| Error("validation worker panicked".to_owned()))??;
            all.extend(chunk_verdicts);
        }
        all
    };

    // summary
    let valid: Vec<_> = verdicts.iter().filter(|v| v.valid).collect();
    let invalid: Vec<_> = verdicts.iter().filter(|v| !v.valid).collect();
    println!();
    println!("Validation complete:");
    println!("  Valid: {}", valid.len());
    println!("  Invalid: {}", invalid.len());
    if !invalid.is_empty() {
        println!();
        println!("Invalid puzzles:");
        for verdict in &invalid {
            println!("  - {}: {}", verdict.id, verdict.reason);
        }
    }

    if let Some(path) = matches.value_of("output") {
        let report = Report::new(&engine, &records, &verdicts);
        write(path, serde_yaml::to_string(&report)?)?;
        println!();
        println!("Results saved to: {}", path);
    }

    Ok(())
}

/// Parses a numeric command-line argument that has a default value.
fn parse_number<T: std::str::FromStr>(matches: &clap::ArgMatches<'_>, name: &str)
-> Result<T, Error> {
    matches.value_of(name)
        .expect("INFALLIBLE")
        .parse()
        .map_err(|_| Error(format!("{} must be numeric", name)))
}

/// Validates a slice of records on one engine session.
///
/// A session-level failure tears the engine down; a fresh one is launched and the interrupted
/// record retried once. A second failure on the same record gives up on the whole chunk.
fn validate_chunk(
    records: &[PuzzleRecord],
    engine: &str,
    engine_args: &[String],
    name: &str,
    dialect: &Dialect,
    policy: DepthPolicy,
) -> Result<Vec<Verdict>, Error> {
    let launch = || -> Result<Validator<UciClient>, Error> {
        let client = UciClient::launch(
                engine, engine_args, name, dialect.clone(), Limits::default())
            .map_err(|err| Error(format!("{}: {}", engine, err)))?;
        Ok(Validator::new(client, policy))
    };

    let mut validator = launch()?;
    let mut verdicts = Vec::with_capacity(records.len());
    let mut retried = false;

    let mut index = 0;
    while index < records.len() {
        let record = &records[index];
        match validator.validate(record) {
            Ok(verdict) => {
                verdicts.push(verdict);
                index += 1;
                retried = false;
            },
            Err(err) => {
                error!("{}: session failure: {}", record.id, err);
                if retried {
                    return Err(Error(
                        format!("{}: engine session failed twice: {}", record.id, err)));
                }
                validator = launch()?;
                retried = true;
            },
        }
    }

    Ok(verdicts)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The shape of the puzzle input file.
#[derive(Debug, Deserialize)]
struct PuzzleFile {
    puzzles: Vec<PuzzleRecord>,
}

/// The results file written with `--output`.
#[derive(Debug, Serialize)]
struct Report {
    generated: String,
    engine: String,
    valid_count: usize,
    invalid_count: usize,
    valid: Vec<ValidEntry>,
    invalid: Vec<InvalidEntry>,
}

#[derive(Debug, Serialize)]
struct ValidEntry {
    id: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct InvalidEntry {
    id: String,
    reason: String,
    fen: String,
    moves: String,
    mate_in: u32,
}

impl Report {
    /// Builds the report from the records and their verdicts, echoing the offending input for
    /// every rejected record so it can be audited without the original file.
    fn new(engine: &str, records: &[PuzzleRecord], verdicts: &[Verdict]) -> Report {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();

        for (record, verdict) in records.iter().zip(verdicts) {
            if verdict.valid {
                valid.push(ValidEntry {
                    id: verdict.id.clone(),
                    reason: verdict.reason.clone(),
                });
            } else {
                invalid.push(InvalidEntry {
                    id: verdict.id.clone(),
                    reason: verdict.reason.clone(),
                    fen: record.fen.clone(),
                    moves: record.moves.clone(),
                    mate_in: record.mate_in,
                });
            }
        }

        Report {
            generated: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            engine: engine.to_owned(),
            valid_count: valid.len(),
            invalid_count: invalid.len(),
            valid,
            invalid,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
struct Error(String);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for Error { }

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error(err.to_string())
    }
}
