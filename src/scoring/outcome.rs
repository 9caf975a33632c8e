use serde::{Deserialize, Serialize};
use std::fmt;

/// Short token describing the result of one delivery: `.` dot ball, `4`
/// boundary, `1w` wide plus one, `2nb` two off a no-ball, `W` wicket, ...
///
/// The dispatcher forwards whatever code it is handed; use
/// [`OutcomeCode::parse`] to check input against the scoring vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeCode(String);

impl OutcomeCode {
    pub fn new(code: impl Into<String>) -> Self {
        OutcomeCode(code.into())
    }

    /// Look the code up in the scoring vocabulary.
    pub fn parse(code: &str) -> Option<Self> {
        option_for_code(code).map(|opt| OutcomeCode::new(opt.code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wicket codes carry an upper-case `W` (`W`, `1W`, ...). Wides use lower-case `w`.
    pub fn is_wicket(&self) -> bool {
        self.0.contains('W')
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Button groups of the scoring panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeGroup {
    Runs,
    Boundaries,
    Wides,
    Byes,
    LegByes,
    NoBalls,
    Wickets,
}

/// One entry of the scoring vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoringOption {
    pub group: OutcomeGroup,
    pub label: &'static str,
    pub code: &'static str,
    pub shortcut: Option<char>,
}

const fn opt(
    group: OutcomeGroup,
    label: &'static str,
    code: &'static str,
    shortcut: Option<char>,
) -> ScoringOption {
    ScoringOption {
        group,
        label,
        code,
        shortcut,
    }
}

/// Every outcome the scorer can record, in panel order.
pub const VOCABULARY: &[ScoringOption] = &[
    opt(OutcomeGroup::Runs, "Dot", ".", Some('0')),
    opt(OutcomeGroup::Runs, "Single", "1", Some('1')),
    opt(OutcomeGroup::Runs, "Double", "2", Some('2')),
    opt(OutcomeGroup::Runs, "Triple", "3", Some('3')),
    opt(OutcomeGroup::Boundaries, "Four", "4", Some('4')),
    opt(OutcomeGroup::Boundaries, "Six", "6", Some('6')),
    opt(OutcomeGroup::Wides, "Wd + 1", "1w", Some('W')),
    opt(OutcomeGroup::Wides, "Wd + 2", "2w", None),
    opt(OutcomeGroup::Wides, "Wd + 3", "3w", None),
    opt(OutcomeGroup::Wides, "Wd + 4", "4w", None),
    opt(OutcomeGroup::Byes, "1 Bye", "1b", Some('B')),
    opt(OutcomeGroup::Byes, "2 Byes", "2b", None),
    opt(OutcomeGroup::Byes, "3 Byes", "3b", None),
    opt(OutcomeGroup::Byes, "4 Byes", "4b", None),
    opt(OutcomeGroup::LegByes, "1 LB", "1lb", Some('L')),
    opt(OutcomeGroup::LegByes, "2 LB", "2lb", None),
    opt(OutcomeGroup::LegByes, "3 LB", "3lb", None),
    opt(OutcomeGroup::LegByes, "4 LB", "4lb", None),
    opt(OutcomeGroup::NoBalls, "NB", "1nb", Some('N')),
    opt(OutcomeGroup::NoBalls, "1+ NB", "2nb", None),
    opt(OutcomeGroup::NoBalls, "2+ NB", "3nb", None),
    opt(OutcomeGroup::NoBalls, "3+ NB", "4nb", None),
    opt(OutcomeGroup::NoBalls, "4+ NB", "5nb", None),
    opt(OutcomeGroup::NoBalls, "6+ NB", "7nb", None),
    opt(OutcomeGroup::Wickets, "W", "W", Some('K')),
    opt(OutcomeGroup::Wickets, "1 + W", "1W", None),
    opt(OutcomeGroup::Wickets, "2 + W", "2W", None),
    opt(OutcomeGroup::Wickets, "3 + W", "3W", None),
    opt(OutcomeGroup::Wickets, "4 + W", "4W", None),
];

pub fn option_for_code(code: &str) -> Option<&'static ScoringOption> {
    VOCABULARY.iter().find(|o| o.code == code)
}

/// Resolve a keyboard shortcut (case-insensitive) to its outcome.
pub fn option_for_shortcut(key: char) -> Option<&'static ScoringOption> {
    let key = key.to_ascii_lowercase();
    VOCABULARY
        .iter()
        .find(|o| o.shortcut.map(|s| s.to_ascii_lowercase()) == Some(key))
}

/// How a batter was dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DismissalType {
    Bowled,
    TimedOut,
    Caught,
    HandledTheBall,
    HitTheBallTwice,
    HitWicket,
    LegBeforeWicket,
    ObstructingTheField,
    RunOut,
    Stumped,
}

impl DismissalType {
    pub const ALL: [DismissalType; 10] = [
        DismissalType::Bowled,
        DismissalType::TimedOut,
        DismissalType::Caught,
        DismissalType::HandledTheBall,
        DismissalType::HitTheBallTwice,
        DismissalType::HitWicket,
        DismissalType::LegBeforeWicket,
        DismissalType::ObstructingTheField,
        DismissalType::RunOut,
        DismissalType::Stumped,
    ];

    /// Scorecard abbreviation (`b`, `c`, `lbw`, ...).
    pub fn abbreviation(self) -> &'static str {
        match self {
            DismissalType::Bowled => "b",
            DismissalType::TimedOut => "to",
            DismissalType::Caught => "c",
            DismissalType::HandledTheBall => "hb",
            DismissalType::HitTheBallTwice => "ht",
            DismissalType::HitWicket => "hw",
            DismissalType::LegBeforeWicket => "lbw",
            DismissalType::ObstructingTheField => "of",
            DismissalType::RunOut => "ro",
            DismissalType::Stumped => "st",
        }
    }

    /// Whether the wicket goes to the bowler's figures.
    pub fn credited_to_bowler(self) -> bool {
        matches!(
            self,
            DismissalType::Bowled
                | DismissalType::Caught
                | DismissalType::HitWicket
                | DismissalType::LegBeforeWicket
                | DismissalType::Stumped
        )
    }

    /// Whether a fielder is recorded with this dismissal.
    pub fn takes_fielder(self) -> bool {
        matches!(self, DismissalType::Caught | DismissalType::RunOut)
    }

    /// Accepts `RUN_OUT`, `run-out`, `run_out`, `runout`, or the abbreviation (`ro`).
    pub fn parse(input: &str) -> Option<Self> {
        let normalized: String = input
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_uppercase)
            .collect();
        DismissalType::ALL.into_iter().find(|d| {
            d.to_string().replace('_', "") == normalized
                || d.abbreviation().to_uppercase() == normalized
        })
    }
}

impl fmt::Display for DismissalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same name the backend sees on the wire
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(name)) => f.pad(&name),
            _ => Err(fmt::Error),
        }
    }
}
