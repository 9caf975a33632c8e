//! In-memory backend for exercising the aggregator and dispatcher.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::api::models::{
    CreateMatchRequest, DismissalRequest, InningsOvers, MatchHeader, MatchSnapshot, TeamPlayers,
};
use crate::api::{ApiError, MatchBackend};

pub fn innings_json(state: &str, striker: Option<i64>, non_striker: Option<i64>) -> Value {
    json!({
        "title": format!("Innings {:?}/{:?}", striker, non_striker),
        "state": state,
        "currentStrikerId": striker,
        "currentNonStrikerId": non_striker,
        "overCompleted": false,
        "bowlers": [{"name": "Ravi", "overs": "2.0", "runsConceded": 12, "wickets": 1}],
    })
}

pub fn snapshot_with(state: &str, innings: Vec<Value>) -> MatchSnapshot {
    serde_json::from_value(json!({
        "matchId": "m-1",
        "teamA": "Lions",
        "teamB": "Tigers",
        "state": state,
        "innings": innings,
    }))
    .unwrap()
}

pub struct FakeBackend {
    snapshot: Mutex<MatchSnapshot>,
    snapshot_error: Mutex<Option<ApiError>>,
    command_error: Mutex<Option<ApiError>>,
    calls: Mutex<Vec<String>>,
    dismissals: Mutex<Vec<DismissalRequest>>,
    snapshot_gate: Mutex<Option<Arc<Notify>>>,
    snapshot_entered: Notify,
    command_gate: Mutex<Option<Arc<Notify>>>,
    command_entered: Notify,
}

impl Default for FakeBackend {
    fn default() -> Self {
        FakeBackend {
            snapshot: Mutex::new(snapshot_with(
                "IN_PROGRESS",
                vec![innings_json("IN_PROGRESS", Some(1), Some(2))],
            )),
            snapshot_error: Mutex::new(None),
            command_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            dismissals: Mutex::new(Vec::new()),
            snapshot_gate: Mutex::new(None),
            snapshot_entered: Notify::new(),
            command_gate: Mutex::new(None),
            command_entered: Notify::new(),
        }
    }
}

impl FakeBackend {
    pub fn set_snapshot(&self, snapshot: MatchSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn fail_snapshot(&self, message: &str) {
        *self.snapshot_error.lock().unwrap() = Some(ApiError::Backend {
            status: None,
            message: message.to_string(),
        });
    }

    pub fn heal_snapshot(&self) {
        *self.snapshot_error.lock().unwrap() = None;
    }

    pub fn fail_commands(&self, message: &str) {
        *self.command_error.lock().unwrap() = Some(ApiError::Backend {
            status: None,
            message: message.to_string(),
        });
    }

    /// The next `live_match` call captures the current snapshot, then waits on the returned gate.
    pub fn gate_next_snapshot(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.snapshot_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub async fn wait_snapshot_entered(&self) {
        self.snapshot_entered.notified().await;
    }

    /// The next command call waits on the returned gate before answering.
    pub fn gate_next_command(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.command_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub async fn wait_command_entered(&self) {
        self.command_entered.notified().await;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(':').next() == Some(prefix))
            .count()
    }

    pub fn dismissals(&self) -> Vec<DismissalRequest> {
        self.dismissals.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn command(&self, call: String) -> Result<(), ApiError> {
        self.record(call);
        let gate = self.command_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.command_entered.notify_one();
            gate.notified().await;
        }
        match self.command_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MatchBackend for FakeBackend {
    async fn match_header(&self, _match_id: &str) -> Result<MatchHeader, ApiError> {
        self.record("match_header".into());
        Ok(serde_json::from_value(json!({
            "matchId": 1, "teamA": "Lions", "teamB": "Tigers", "venue": "Eden Park"
        }))
        .unwrap())
    }

    async fn live_match(&self, _match_id: &str) -> Result<MatchSnapshot, ApiError> {
        self.record("live_match".into());
        let result = match self.snapshot_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(self.snapshot.lock().unwrap().clone()),
        };
        let gate = self.snapshot_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.snapshot_entered.notify_one();
            gate.notified().await;
        }
        result
    }

    async fn overs(&self, _match_id: &str) -> Result<Vec<InningsOvers>, ApiError> {
        self.record("overs".into());
        Ok(serde_json::from_value(json!([{
            "teamName": "Lions", "teamId": 1, "inningsNumber": 1,
            "overs": [{"overNumber": 1, "balls": [".", "4", "1w"], "completed": false}]
        }]))
        .unwrap())
    }

    async fn players(&self, _match_id: &str) -> Result<TeamPlayers, ApiError> {
        self.record("players".into());
        Ok(TeamPlayers {
            team_a_players: vec![],
            team_b_players: vec![],
        })
    }

    async fn create_live_match(&self, request: &CreateMatchRequest) -> Result<(), ApiError> {
        self.command(format!("create_live_match:{}", request.match_id)).await
    }

    async fn start_innings(&self, _match_id: &str, team_id: i64) -> Result<(), ApiError> {
        self.command(format!("start_innings:{}", team_id)).await
    }

    async fn start_over(&self, _match_id: &str, bowler_id: i64) -> Result<(), ApiError> {
        self.command(format!("start_over:{}", bowler_id)).await
    }

    async fn start_batter(&self, _match_id: &str, batter_id: i64) -> Result<(), ApiError> {
        self.command(format!("start_batter:{}", batter_id)).await
    }

    async fn complete_ball(&self, _match_id: &str, outcome: &str) -> Result<(), ApiError> {
        self.command(format!("complete_ball:{}", outcome)).await
    }

    async fn complete_ball_dismissal(
        &self,
        _match_id: &str,
        request: &DismissalRequest,
    ) -> Result<(), ApiError> {
        self.dismissals.lock().unwrap().push(request.clone());
        self.command(format!("complete_ball_dismissal:{}", request.outcome))
            .await
    }

    async fn undo(&self, _match_id: &str) -> Result<(), ApiError> {
        self.command("undo".into()).await
    }
}
