use serde::Serialize;

use crate::api::models::{Innings, InningsState, MatchSnapshot, MatchState};

/// The input surface offered to the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum ScorerForm {
    /// No snapshot (or no innings) loaded yet.
    Loading,
    /// Match finished; only the result is shown.
    ResultOnly { result: Option<String> },
    NotStarted,
    AddBatter,
    StartOver,
    StartInnings,
    ScoringControls,
}

/// Everything the selector looks at, flattened out of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorInput {
    pub match_state: MatchState,
    pub innings_state: InningsState,
    pub striker_id: Option<i64>,
    pub non_striker_id: Option<i64>,
    pub over_completed: bool,
    pub bowler_count: usize,
}

impl SelectorInput {
    pub fn new(match_state: MatchState, innings: &Innings) -> Self {
        SelectorInput {
            match_state,
            innings_state: innings.state,
            striker_id: innings.current_striker_id,
            non_striker_id: innings.current_non_striker_id,
            over_completed: innings.over_completed == Some(true),
            bowler_count: innings.bowlers.len(),
        }
    }
}

/// Pick the form for a match state. Rows are evaluated top to bottom; the
/// catch-all arm repeats the in-progress rows with the extra "no bowlers yet"
/// condition and must stay as is for innings states such as drinks or rain.
pub fn select(input: &SelectorInput) -> ScorerForm {
    let batter_missing = input.striker_id.is_none() || input.non_striker_id.is_none();

    match input.match_state {
        MatchState::Completed => ScorerForm::ResultOnly { result: None },
        MatchState::NotStarted => ScorerForm::NotStarted,
        MatchState::InProgress => match input.innings_state {
            InningsState::BetweenOvers => {
                if input.striker_id.is_none() {
                    ScorerForm::AddBatter
                } else {
                    ScorerForm::StartOver
                }
            }
            InningsState::Completed => ScorerForm::StartInnings,
            InningsState::InProgress => {
                if batter_missing {
                    ScorerForm::AddBatter
                } else if input.over_completed {
                    ScorerForm::StartOver
                } else {
                    ScorerForm::ScoringControls
                }
            }
            _ => {
                if batter_missing {
                    ScorerForm::AddBatter
                } else if input.over_completed || input.bowler_count == 0 {
                    ScorerForm::StartOver
                } else {
                    ScorerForm::ScoringControls
                }
            }
        },
    }
}

/// Pick the form for a loaded snapshot and its current innings.
pub fn select_form(snapshot: Option<&MatchSnapshot>, innings: Option<&Innings>) -> ScorerForm {
    let (Some(snapshot), Some(innings)) = (snapshot, innings) else {
        return ScorerForm::Loading;
    };
    match select(&SelectorInput::new(snapshot.state, innings)) {
        ScorerForm::ResultOnly { .. } => ScorerForm::ResultOnly {
            result: snapshot.result.clone(),
        },
        form => form,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(
        match_state: MatchState,
        innings_state: InningsState,
        striker: Option<i64>,
        non_striker: Option<i64>,
    ) -> SelectorInput {
        SelectorInput {
            match_state,
            innings_state,
            striker_id: striker,
            non_striker_id: non_striker,
            over_completed: false,
            bowler_count: 1,
        }
    }

    const ALL_INNINGS_STATES: [InningsState; 9] = [
        InningsState::NotStarted,
        InningsState::InProgress,
        InningsState::BetweenOvers,
        InningsState::Drinks,
        InningsState::Lunch,
        InningsState::Tea,
        InningsState::RainDelay,
        InningsState::Completed,
        InningsState::Unknown,
    ];

    #[test]
    fn completed_and_not_started_ignore_innings() {
        for state in ALL_INNINGS_STATES {
            let i = input(MatchState::Completed, state, None, None);
            assert_eq!(select(&i), ScorerForm::ResultOnly { result: None });
            let i = input(MatchState::NotStarted, state, Some(1), Some(2));
            assert_eq!(select(&i), ScorerForm::NotStarted);
        }
    }

    #[test]
    fn between_overs_only_needs_a_striker() {
        let i = input(MatchState::InProgress, InningsState::BetweenOvers, None, Some(2));
        assert_eq!(select(&i), ScorerForm::AddBatter);
        // Non-striker missing is not checked between overs
        let i = input(MatchState::InProgress, InningsState::BetweenOvers, Some(42), None);
        assert_eq!(select(&i), ScorerForm::StartOver);
    }

    #[test]
    fn completed_innings_asks_for_next_innings() {
        let i = input(MatchState::InProgress, InningsState::Completed, None, None);
        assert_eq!(select(&i), ScorerForm::StartInnings);
    }

    #[test]
    fn in_progress_without_striker_adds_batter_regardless_of_over() {
        for over_completed in [false, true] {
            let i = SelectorInput {
                over_completed,
                ..input(MatchState::InProgress, InningsState::InProgress, None, Some(2))
            };
            assert_eq!(select(&i), ScorerForm::AddBatter);
        }
        let i = input(MatchState::InProgress, InningsState::InProgress, Some(1), None);
        assert_eq!(select(&i), ScorerForm::AddBatter);
    }

    #[test]
    fn in_progress_over_completed_starts_over() {
        let i = SelectorInput {
            over_completed: true,
            ..input(MatchState::InProgress, InningsState::InProgress, Some(1), Some(2))
        };
        assert_eq!(select(&i), ScorerForm::StartOver);
    }

    #[test]
    fn in_progress_ignores_bowler_count() {
        let i = SelectorInput {
            bowler_count: 0,
            ..input(MatchState::InProgress, InningsState::InProgress, Some(1), Some(2))
        };
        assert_eq!(select(&i), ScorerForm::ScoringControls);
    }

    #[test]
    fn other_innings_states_use_fallback_rows() {
        for state in [
            InningsState::NotStarted,
            InningsState::Drinks,
            InningsState::Lunch,
            InningsState::Tea,
            InningsState::RainDelay,
            InningsState::Unknown,
        ] {
            let i = input(MatchState::InProgress, state, None, Some(2));
            assert_eq!(select(&i), ScorerForm::AddBatter, "{:?}", state);

            let i = SelectorInput {
                bowler_count: 0,
                ..input(MatchState::InProgress, state, Some(1), Some(2))
            };
            assert_eq!(select(&i), ScorerForm::StartOver, "{:?}", state);

            let i = SelectorInput {
                over_completed: true,
                ..input(MatchState::InProgress, state, Some(1), Some(2))
            };
            assert_eq!(select(&i), ScorerForm::StartOver, "{:?}", state);

            let i = input(MatchState::InProgress, state, Some(1), Some(2));
            assert_eq!(select(&i), ScorerForm::ScoringControls, "{:?}", state);
        }
    }

    #[test]
    fn select_is_deterministic() {
        let i = input(MatchState::InProgress, InningsState::Tea, Some(1), Some(2));
        assert_eq!(select(&i), select(&i));
    }

    #[test]
    fn select_form_without_data_is_loading() {
        assert_eq!(select_form(None, None), ScorerForm::Loading);
    }

    #[test]
    fn select_form_carries_result_text() {
        let snapshot: MatchSnapshot = serde_json::from_value(serde_json::json!({
            "matchId": "m-1",
            "state": "COMPLETED",
            "result": "Lions won by 4 wickets",
            "innings": [{"state": "COMPLETED"}]
        }))
        .unwrap();
        let form = select_form(Some(&snapshot), snapshot.innings.first());
        assert_eq!(
            form,
            ScorerForm::ResultOnly {
                result: Some("Lions won by 4 wickets".into())
            }
        );
    }
}
