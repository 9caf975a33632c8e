//! Line-oriented scorer console: one command per line on stdin.

use std::path::PathBuf;

use crate::scoring::outcome::option_for_shortcut;
use crate::scoring::{DismissalType, OutcomeCode, ScoringCommand};

pub const HELP: &str = "\
commands:
  innings <teamId>                 start an innings
  over <bowlerId>                  start an over
  batter <playerId>                send in a batter
  <outcome>                        score a delivery (., 1, 4, 1w, 2nb, 1b, ...)
  <W-outcome> <dismissal> [id]     score a wicket, e.g. `W caught 17`
  key <c> [dismissal] [id]         score by shortcut key
  undo                             reverse the last scoring action
  refresh | overs | squads | status
  start-match <file.json>          create a live match from a fixture file
  reconnect                        reopen the realtime connection
  keys                             list outcome codes, shortcuts and dismissals
  logout                           forget the stored auth token
  theme dark|light | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Score(ScoringCommand),
    Refresh,
    Overs,
    Squads,
    Status,
    StartMatch(PathBuf),
    Reconnect,
    Logout,
    Keys,
    Theme { dark: bool },
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("unknown command '{0}' (try `help`)")]
    Unknown(String),
    #[error("`{command}` needs {what}")]
    MissingArgument { command: String, what: &'static str },
    #[error("'{0}' is not a valid id")]
    BadId(String),
    #[error("unknown dismissal '{0}'")]
    BadDismissal(String),
    #[error("wicket outcome '{0}' needs a dismissal type, e.g. `{0} bowled`")]
    MissingDismissal(String),
    #[error("'{0}' takes no dismissal")]
    NotAWicket(String),
    #[error("no scoring shortcut on key '{0}'")]
    BadShortcut(String),
    #[error("unexpected extra input '{0}'")]
    Trailing(String),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "innings" => ConsoleCommand::Score(ScoringCommand::StartInnings {
            team_id: single_id(head, &rest, "a team id")?,
        }),
        "over" => ConsoleCommand::Score(ScoringCommand::StartOver {
            bowler_id: single_id(head, &rest, "a bowler id")?,
        }),
        "batter" => ConsoleCommand::Score(ScoringCommand::StartBatter {
            batter_id: single_id(head, &rest, "a player id")?,
        }),
        "undo" => no_args(&rest, ConsoleCommand::Score(ScoringCommand::Undo))?,
        "refresh" => no_args(&rest, ConsoleCommand::Refresh)?,
        "overs" => no_args(&rest, ConsoleCommand::Overs)?,
        "squads" => no_args(&rest, ConsoleCommand::Squads)?,
        "status" => no_args(&rest, ConsoleCommand::Status)?,
        "reconnect" => no_args(&rest, ConsoleCommand::Reconnect)?,
        "logout" => no_args(&rest, ConsoleCommand::Logout)?,
        "keys" => no_args(&rest, ConsoleCommand::Keys)?,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => no_args(&rest, ConsoleCommand::Quit)?,
        "start-match" => match rest.as_slice() {
            [path] => ConsoleCommand::StartMatch(PathBuf::from(*path)),
            [] => return Err(missing(head, "a fixture file")),
            [_, extra @ ..] => return Err(ConsoleError::Trailing(extra.join(" "))),
        },
        "theme" => match rest.as_slice() {
            ["dark"] => ConsoleCommand::Theme { dark: true },
            ["light"] => ConsoleCommand::Theme { dark: false },
            _ => return Err(missing(head, "`dark` or `light`")),
        },
        "key" => {
            let (key, tail) = rest
                .split_first()
                .ok_or_else(|| missing(head, "a shortcut key"))?;
            let mut chars = key.chars();
            let option = match (chars.next(), chars.next()) {
                (Some(c), None) => option_for_shortcut(c),
                _ => None,
            }
            .ok_or_else(|| ConsoleError::BadShortcut(key.to_string()))?;
            score(OutcomeCode::new(option.code), tail)?
        }
        _ => match OutcomeCode::parse(head) {
            Some(outcome) => score(outcome, &rest)?,
            None => return Err(ConsoleError::Unknown(head.to_string())),
        },
    };
    Ok(Some(command))
}

fn score(outcome: OutcomeCode, args: &[&str]) -> Result<ConsoleCommand, ConsoleError> {
    if !outcome.is_wicket() {
        if !args.is_empty() {
            return Err(ConsoleError::NotAWicket(outcome.to_string()));
        }
        return Ok(ConsoleCommand::Score(ScoringCommand::AddScore { outcome }));
    }

    let (dismissal, fielder_id) = match args {
        [] => return Err(ConsoleError::MissingDismissal(outcome.to_string())),
        [dismissal] => (*dismissal, None),
        [dismissal, fielder] => (*dismissal, Some(parse_id(fielder)?)),
        [_, _, extra @ ..] => return Err(ConsoleError::Trailing(extra.join(" "))),
    };
    let dismissal = DismissalType::parse(dismissal)
        .ok_or_else(|| ConsoleError::BadDismissal(dismissal.to_string()))?;
    Ok(ConsoleCommand::Score(ScoringCommand::AddScoreWithDismissal {
        outcome,
        dismissal,
        fielder_id,
    }))
}

fn single_id(command: &str, args: &[&str], what: &'static str) -> Result<i64, ConsoleError> {
    match args {
        [id] => parse_id(id),
        [] => Err(missing(command, what)),
        [_, extra @ ..] => Err(ConsoleError::Trailing(extra.join(" "))),
    }
}

fn no_args(args: &[&str], command: ConsoleCommand) -> Result<ConsoleCommand, ConsoleError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(ConsoleError::Trailing(args.join(" ")))
    }
}

fn parse_id(s: &str) -> Result<i64, ConsoleError> {
    s.parse().map_err(|_| ConsoleError::BadId(s.to_string()))
}

fn missing(command: &str, what: &'static str) -> ConsoleError {
    ConsoleError::MissingArgument {
        command: command.to_string(),
        what,
    }
}
