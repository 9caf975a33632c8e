use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::aggregator::MatchAggregator;
use super::outcome::{DismissalType, OutcomeCode};
use crate::api::models::{CreateMatchRequest, DismissalRequest, TeamPlayers};
use crate::api::{ApiError, MatchBackend};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// Another command (or its follow-up refresh) is still running.
    #[error("Another scoring command is still in progress")]
    Busy,

    #[error("'{0}' is not a wicket outcome")]
    NotAWicket(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One user-initiated scoring action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ScoringCommand {
    StartInnings { team_id: i64 },
    StartOver { bowler_id: i64 },
    StartBatter { batter_id: i64 },
    AddScore { outcome: OutcomeCode },
    AddScoreWithDismissal {
        outcome: OutcomeCode,
        dismissal: DismissalType,
        fielder_id: Option<i64>,
    },
    Undo,
}

impl fmt::Display for ScoringCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringCommand::StartInnings { team_id } => write!(f, "start innings (team {})", team_id),
            ScoringCommand::StartOver { bowler_id } => write!(f, "start over (bowler {})", bowler_id),
            ScoringCommand::StartBatter { batter_id } => write!(f, "start batter ({})", batter_id),
            ScoringCommand::AddScore { outcome } => write!(f, "score '{}'", outcome),
            ScoringCommand::AddScoreWithDismissal {
                outcome, dismissal, ..
            } => write!(f, "score '{}' ({})", outcome, dismissal),
            ScoringCommand::Undo => f.write_str("undo"),
        }
    }
}

/// Runs scoring commands against the backend for one match and keeps the
/// aggregator in step afterwards.
///
/// Commands are single-flight: while one is running, including the refetch
/// that follows it, any other command is rejected with [`CommandError::Busy`].
/// Every command that reaches the backend is followed by exactly one refetch,
/// whether it succeeded or not; a failure is also recorded on the aggregator.
pub struct ScoringDispatcher {
    aggregator: Arc<MatchAggregator>,
    backend: Arc<dyn MatchBackend>,
    guard: Mutex<()>,
}

impl ScoringDispatcher {
    pub fn new(aggregator: Arc<MatchAggregator>, backend: Arc<dyn MatchBackend>) -> Self {
        ScoringDispatcher {
            aggregator,
            backend,
            guard: Mutex::new(()),
        }
    }

    pub fn aggregator(&self) -> &Arc<MatchAggregator> {
        &self.aggregator
    }

    pub async fn start_inning(&self, team_id: i64) -> Result<(), CommandError> {
        self.execute(ScoringCommand::StartInnings { team_id }).await
    }

    pub async fn start_over(&self, bowler_id: i64) -> Result<(), CommandError> {
        self.execute(ScoringCommand::StartOver { bowler_id }).await
    }

    pub async fn start_batter(&self, batter_id: i64) -> Result<(), CommandError> {
        self.execute(ScoringCommand::StartBatter { batter_id }).await
    }

    /// Record a delivery. The code is forwarded as given.
    pub async fn add_score(&self, outcome: &OutcomeCode) -> Result<(), CommandError> {
        self.execute(ScoringCommand::AddScore {
            outcome: outcome.clone(),
        })
        .await
    }

    /// Record a wicket delivery. The fielder is only sent for dismissals that take one.
    pub async fn add_score_with_dismissal(
        &self,
        outcome: &OutcomeCode,
        dismissal: DismissalType,
        fielder_id: Option<i64>,
    ) -> Result<(), CommandError> {
        self.execute(ScoringCommand::AddScoreWithDismissal {
            outcome: outcome.clone(),
            dismissal,
            fielder_id,
        })
        .await
    }

    /// Reverse the most recent scoring action on the server.
    pub async fn undo(&self) -> Result<(), CommandError> {
        self.execute(ScoringCommand::Undo).await
    }

    pub async fn execute(&self, command: ScoringCommand) -> Result<(), CommandError> {
        let command = normalize(command)?;
        let _permit = self.guard.try_lock().map_err(|_| {
            warn!("Rejected {}: another command is in flight", command);
            CommandError::Busy
        })?;

        self.aggregator.clear_error().await;
        info!("Sending {}", command);
        let result = self.send(&command).await;
        if let Err(e) = &result {
            self.aggregator.record_error(e.message()).await;
        }
        self.aggregator.refetch().await;
        result.map_err(CommandError::from)
    }

    /// Turn a scheduled fixture into a live match. Not tied to the current
    /// match state, so it skips the follow-up refetch but still holds the guard.
    pub async fn create_live_match(&self, request: &CreateMatchRequest) -> Result<(), CommandError> {
        let _permit = self.guard.try_lock().map_err(|_| CommandError::Busy)?;
        info!("Creating live match for fixture {}", request.match_id);
        self.backend.create_live_match(request).await?;
        Ok(())
    }

    /// Both squads, for picking batters, bowlers and fielders by id.
    pub async fn players(&self) -> Result<TeamPlayers, CommandError> {
        Ok(self.backend.players(self.aggregator.match_id()).await?)
    }

    async fn send(&self, command: &ScoringCommand) -> Result<(), ApiError> {
        let match_id = self.aggregator.match_id();
        match command {
            ScoringCommand::StartInnings { team_id } => {
                self.backend.start_innings(match_id, *team_id).await
            }
            ScoringCommand::StartOver { bowler_id } => {
                self.backend.start_over(match_id, *bowler_id).await
            }
            ScoringCommand::StartBatter { batter_id } => {
                self.backend.start_batter(match_id, *batter_id).await
            }
            ScoringCommand::AddScore { outcome } => {
                self.backend.complete_ball(match_id, outcome.as_str()).await
            }
            ScoringCommand::AddScoreWithDismissal {
                outcome,
                dismissal,
                fielder_id,
            } => {
                let request = DismissalRequest {
                    outcome: outcome.as_str().to_string(),
                    dismissal_type: *dismissal,
                    fielder_id: *fielder_id,
                };
                self.backend.complete_ball_dismissal(match_id, &request).await
            }
            ScoringCommand::Undo => self.backend.undo(match_id).await,
        }
    }
}

/// Local checks that never touch the network: wicket commands need a wicket
/// code, and a fielder is dropped for dismissals that have none.
fn normalize(command: ScoringCommand) -> Result<ScoringCommand, CommandError> {
    match command {
        ScoringCommand::AddScoreWithDismissal {
            outcome,
            dismissal,
            fielder_id,
        } => {
            if !outcome.is_wicket() {
                return Err(CommandError::NotAWicket(outcome.as_str().to_string()));
            }
            Ok(ScoringCommand::AddScoreWithDismissal {
                outcome,
                dismissal,
                fielder_id: fielder_id.filter(|_| dismissal.takes_fielder()),
            })
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::aggregator::CurrentInningsPolicy;
    use crate::scoring::outcome::VOCABULARY;
    use crate::scoring::testing::{innings_json, snapshot_with, FakeBackend};
    use crate::scoring::view::ScorerForm;

    fn setup() -> (Arc<FakeBackend>, Arc<MatchAggregator>, ScoringDispatcher) {
        let backend = Arc::new(FakeBackend::default());
        let aggregator = Arc::new(MatchAggregator::new(
            "m-1",
            backend.clone(),
            CurrentInningsPolicy::FirstListed,
        ));
        let dispatcher = ScoringDispatcher::new(aggregator.clone(), backend.clone());
        (backend, aggregator, dispatcher)
    }

    #[tokio::test]
    async fn every_outcome_is_forwarded_then_refetched_once() {
        for option in VOCABULARY {
            let (backend, _, dispatcher) = setup();
            let code = OutcomeCode::new(option.code);
            dispatcher.add_score(&code).await.unwrap();
            assert_eq!(backend.count("complete_ball"), 1, "code {}", option.code);
            assert_eq!(backend.calls()[0], format!("complete_ball:{}", option.code));
            assert_eq!(backend.count("live_match"), 1);
            assert_eq!(backend.count("match_header"), 1);
        }
    }

    #[tokio::test]
    async fn unknown_codes_are_forwarded_unchanged() {
        let (backend, _, dispatcher) = setup();
        dispatcher.add_score(&OutcomeCode::new("7x")).await.unwrap();
        assert_eq!(backend.calls()[0], "complete_ball:7x");
    }

    #[tokio::test]
    async fn failed_command_still_refetches_and_keeps_error() {
        let (backend, aggregator, dispatcher) = setup();
        backend.fail_commands("Bowler already used");

        let err = dispatcher.start_over(9).await.unwrap_err();
        assert_eq!(err.to_string(), "Bowler already used");
        assert_eq!(backend.calls()[0], "start_over:9");
        assert_eq!(backend.count("live_match"), 1);
        assert_eq!(aggregator.error().await.as_deref(), Some("Bowler already used"));
        // Snapshot refetched fine, so the form is still usable
        assert_eq!(aggregator.form().await, ScorerForm::ScoringControls);
    }

    #[tokio::test]
    async fn success_clears_previous_error() {
        let (backend, aggregator, dispatcher) = setup();
        aggregator.record_error("old failure").await;
        dispatcher.start_batter(5).await.unwrap();
        assert_eq!(backend.calls()[0], "start_batter:5");
        assert_eq!(aggregator.error().await, None);
    }

    #[tokio::test]
    async fn fielder_only_sent_when_dismissal_takes_one() {
        let (backend, _, dispatcher) = setup();
        let wicket = OutcomeCode::new("W");

        dispatcher
            .add_score_with_dismissal(&wicket, DismissalType::Caught, Some(17))
            .await
            .unwrap();
        dispatcher
            .add_score_with_dismissal(&wicket, DismissalType::Bowled, Some(17))
            .await
            .unwrap();
        dispatcher
            .add_score_with_dismissal(&OutcomeCode::new("1W"), DismissalType::RunOut, None)
            .await
            .unwrap();

        let sent = backend.dismissals();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].fielder_id, Some(17));
        assert_eq!(sent[1].fielder_id, None);
        assert_eq!(sent[1].dismissal_type, DismissalType::Bowled);
        assert_eq!(sent[2].outcome, "1W");
        assert_eq!(backend.count("live_match"), 3);
    }

    #[tokio::test]
    async fn supplied_fielder_is_dropped_for_every_type_without_one() {
        let (backend, _, dispatcher) = setup();
        let wicket = OutcomeCode::new("W");
        for dismissal in DismissalType::ALL {
            dispatcher
                .add_score_with_dismissal(&wicket, dismissal, Some(17))
                .await
                .unwrap();
        }

        let sent = backend.dismissals();
        assert_eq!(sent.len(), DismissalType::ALL.len());
        for (request, dismissal) in sent.iter().zip(DismissalType::ALL) {
            assert_eq!(request.dismissal_type, dismissal);
            assert_eq!(
                request.fielder_id.is_some(),
                dismissal.takes_fielder(),
                "{:?}",
                dismissal
            );
        }
    }

    #[tokio::test]
    async fn non_wicket_dismissal_never_reaches_backend() {
        let (backend, _, dispatcher) = setup();
        let err = dispatcher
            .add_score_with_dismissal(&OutcomeCode::new("4"), DismissalType::Bowled, None)
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::NotAWicket("4".into()));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn second_command_is_rejected_while_first_in_flight() {
        let (backend, _, dispatcher) = setup();
        let dispatcher = Arc::new(dispatcher);
        let gate = backend.gate_next_command();

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.add_score(&OutcomeCode::new("4")).await })
        };
        backend.wait_command_entered().await;

        assert_eq!(dispatcher.undo().await, Err(CommandError::Busy));
        gate.notify_one();
        first.await.unwrap().unwrap();

        assert_eq!(backend.count("undo"), 0);
        assert_eq!(backend.count("live_match"), 1);
        // Guard released once the first command's refetch finished
        dispatcher.undo().await.unwrap();
        assert_eq!(backend.count("undo"), 1);
    }

    #[tokio::test]
    async fn undo_then_refresh_shows_server_state() {
        let (backend, aggregator, dispatcher) = setup();
        aggregator.refresh().await;
        assert_eq!(aggregator.form().await, ScorerForm::ScoringControls);

        // Server rolled back to before the non-striker came in
        backend.set_snapshot(snapshot_with(
            "IN_PROGRESS",
            vec![innings_json("IN_PROGRESS", Some(1), None)],
        ));
        dispatcher.undo().await.unwrap();
        assert_eq!(aggregator.form().await, ScorerForm::AddBatter);
        let batters = aggregator.current_batters().await.unwrap();
        assert_eq!(batters.non_striker_id, None);
    }

    #[tokio::test]
    async fn create_live_match_does_not_refetch() {
        let (backend, _, dispatcher) = setup();
        let request: CreateMatchRequest = serde_json::from_value(serde_json::json!({
            "matchId": 12, "teamAPlayers": [1, 2], "teamBPlayers": [3, 4],
            "teamACaptainId": 1, "teamAViceCaptainId": 2, "teamAWicketKeeperId": 2,
            "teamBCaptainId": 3, "teamBViceCaptainId": 4, "teamBWicketKeeperId": 4,
            "electedTeamId": 1, "electedTo": "bat", "overs": 20
        }))
        .unwrap();
        dispatcher.create_live_match(&request).await.unwrap();
        assert_eq!(backend.calls(), vec!["create_live_match:12".to_string()]);
    }

    #[tokio::test]
    async fn backend_rejection_reaches_caller_and_alerts_once() {
        use crate::api::ApiClient;
        use crate::notify::RecordingNotifier;
        use axum::{routing::get, routing::post, Json, Router};
        use serde_json::json;
        use std::time::Duration;

        let router = Router::new()
            .route(
                "/matches/live/:id/start-over",
                post(|| async { Json(json!({"success": false, "message": "Bowler already used"})) }),
            )
            .route(
                "/matches/live/:id",
                get(|| async { Json(json!({"matchId": "m-1", "state": "IN_PROGRESS", "innings": []})) }),
            )
            .route(
                "/match/getMatchScoreById/:id",
                get(|| async {
                    Json(json!({"success": true, "data": {"matchId": 1, "teamA": "Lions", "teamB": "Tigers"}}))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let notifier = Arc::new(RecordingNotifier::default());
        let client = ApiClient::new(
            &format!("http://{}", addr),
            Duration::from_secs(5),
            None,
            Some(notifier.clone()),
        )
        .unwrap();
        let backend: Arc<dyn MatchBackend> = Arc::new(client);
        let aggregator = Arc::new(MatchAggregator::new(
            "m-1",
            backend.clone(),
            CurrentInningsPolicy::default(),
        ));
        let dispatcher = ScoringDispatcher::new(aggregator.clone(), backend);

        let err = dispatcher.start_over(3).await.unwrap_err();
        assert_eq!(err.to_string(), "Bowler already used");
        let alerts = notifier.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Bowler already used");
        assert_eq!(aggregator.error().await.as_deref(), Some("Bowler already used"));
        assert!(aggregator.snapshot().await.is_some());
    }
}
