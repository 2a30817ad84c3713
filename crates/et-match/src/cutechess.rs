//! cutechess-cli backed comparator.
//!
//! Both variants run the same engine binary; they differ only in the UCI
//! options carrying the tuned parameters. Games are played with `-repeat`, so
//! every opening is played once with each colour, and results are scored from
//! the plus engine's side using the colours cutechess reports per game.
//! `-wait 0` keeps cutechess from pausing between games.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use et_optimizer::TrialPair;
use et_types::{EvaluatorError, GameTally, MatchOutcome, MatchRunnerConfig, ParameterVector};

use crate::evaluator::{EvaluatorResult, MatchEvaluator};

/// Engine name given to the plus variant.
pub const PLUS_ENGINE: &str = "plus";
/// Engine name given to the minus variant.
pub const MINUS_ENGINE: &str = "minus";

const FINISHED_GAME: &str = "Finished game";

/// Result token of a finished game, from White's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    /// `*`: the game was stopped without a result.
    Unfinished,
}

impl GameResult {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "1-0" => Some(Self::WhiteWins),
            "0-1" => Some(Self::BlackWins),
            "1/2-1/2" => Some(Self::Draw),
            "*" => Some(Self::Unfinished),
            _ => None,
        }
    }
}

/// One `Finished game` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedGame {
    pub number: u32,
    pub white: String,
    pub black: String,
    pub result: GameResult,
}

impl FinishedGame {
    /// Add this game to a tally kept from `engine`'s point of view.
    ///
    /// Unfinished games are skipped; a game `engine` did not play in is
    /// malformed output.
    pub fn score_for(&self, engine: &str, tally: &mut GameTally) -> EvaluatorResult<()> {
        let engine_is_white = if self.white == engine {
            true
        } else if self.black == engine {
            false
        } else {
            return Err(EvaluatorError::Malformed {
                line: format!(
                    "game {} ({} vs {}) does not involve {engine}",
                    self.number, self.white, self.black
                ),
            });
        };

        match (self.result, engine_is_white) {
            (GameResult::Unfinished, _) => {}
            (GameResult::Draw, _) => tally.record_draw(),
            (GameResult::WhiteWins, true) | (GameResult::BlackWins, false) => tally.record_win(),
            (GameResult::WhiteWins, false) | (GameResult::BlackWins, true) => tally.record_loss(),
        }
        Ok(())
    }
}

/// Parse a cutechess-cli progress line.
///
/// Lines that do not report a finished game yield `Ok(None)`. A line that
/// does but cannot be read is an error rather than a silently dropped game.
pub fn parse_finished_game(line: &str) -> EvaluatorResult<Option<FinishedGame>> {
    let Some(start) = line.find(FINISHED_GAME) else {
        return Ok(None);
    };
    let malformed = || EvaluatorError::Malformed {
        line: line.to_string(),
    };

    let rest = &line[start + FINISHED_GAME.len()..];
    let open = rest.find('(').ok_or_else(malformed)?;
    let close = rest.find("):").ok_or_else(malformed)?;
    if close < open {
        return Err(malformed());
    }

    let number = rest[..open].trim().parse::<u32>().map_err(|_| malformed())?;
    let (white, black) = rest[open + 1..close]
        .split_once(" vs ")
        .ok_or_else(malformed)?;
    let result = rest[close + 2..]
        .split_whitespace()
        .next()
        .and_then(GameResult::parse)
        .ok_or_else(malformed)?;

    Ok(Some(FinishedGame {
        number,
        white: white.trim().to_string(),
        black: black.trim().to_string(),
        result,
    }))
}

/// A fully assembled runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutechessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CutechessCommand {
    /// Assemble the arguments for one batch between the two variants.
    pub fn build(config: &MatchRunnerConfig, pair: &TrialPair, games: u32, seed: u32) -> Self {
        let mut args = Vec::new();

        args.push("-engine".to_string());
        args.push(format!("name={PLUS_ENGINE}"));
        args.extend(engine_options(&pair.plus));

        args.push("-engine".to_string());
        args.push(format!("name={MINUS_ENGINE}"));
        args.extend(engine_options(&pair.minus));

        args.push("-each".to_string());
        args.push("proto=uci".to_string());
        args.push(format!("cmd={}", config.engine));
        args.push(format!("tc={}", config.tc));
        args.push("restart=off".to_string());
        for (name, value) in config.uci_option_pairs() {
            args.push(format!("option.{name}={value}"));
        }

        if let Some(book) = &config.book {
            args.push("-openings".to_string());
            args.push(format!("file={}", book.display()));
            args.push(format!("format={}", config.book_format.as_str()));
            args.push("order=random".to_string());
        }

        args.push("-concurrency".to_string());
        args.push(config.concurrency.to_string());
        args.push("-wait".to_string());
        args.push("0".to_string());
        args.push("-games".to_string());
        args.push(games.to_string());
        args.push("-repeat".to_string());
        args.push("-srand".to_string());
        args.push(seed.to_string());
        args.extend(config.extra_args.iter().cloned());

        Self {
            program: config.binary.clone().unwrap_or_else(default_binary),
            args,
        }
    }
}

/// `option.<name>=<value>` for every tuned parameter. The engine only accepts
/// integral option values, so values are rounded here.
fn engine_options(params: &ParameterVector) -> impl Iterator<Item = String> + '_ {
    params
        .iter()
        .map(|(name, value)| format!("option.{name}={}", value.round() as i64))
}

fn default_binary() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("cutechess-cli.exe")
    } else {
        PathBuf::from("cutechess-cli")
    }
}

/// Runs each batch as a cutechess-cli child process.
///
/// The child is killed if the evaluation future is dropped, so a timeout or a
/// stop request does not leave orphaned matches behind.
#[derive(Debug, Clone)]
pub struct CutechessEvaluator {
    config: MatchRunnerConfig,
}

impl CutechessEvaluator {
    pub fn new(config: MatchRunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchRunnerConfig {
        &self.config
    }

    async fn run(&self, command: CutechessCommand) -> EvaluatorResult<MatchOutcome> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EvaluatorError::Unreachable {
                        message: format!("{}: {e}", command.program.display()),
                    }
                } else {
                    EvaluatorError::Spawn {
                        message: format!("{}: {e}", command.program.display()),
                    }
                }
            })?;

        let stdout = child.stdout.take().ok_or_else(|| EvaluatorError::Spawn {
            message: "runner stdout was not captured".to_string(),
        })?;

        let mut tally = GameTally::default();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(game) = parse_finished_game(&line)? {
                game.score_for(PLUS_ENGINE, &mut tally)?;
                debug!(game = game.number, ?game.result, "game finished");
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(EvaluatorError::ExitStatus {
                code: status.code(),
            });
        }

        MatchOutcome::from_tally(tally)
    }
}

#[async_trait]
impl MatchEvaluator for CutechessEvaluator {
    async fn evaluate(&self, pair: &TrialPair, games: u32) -> EvaluatorResult<MatchOutcome> {
        let seed = rand::rng().random::<u32>() % 100_000_000;
        let command = CutechessCommand::build(&self.config, pair, games, seed);
        info!(
            program = %command.program.display(),
            games,
            seed,
            "starting match batch"
        );
        self.run(command).await
    }

    fn name(&self) -> &str {
        "cutechess-cli"
    }
}
