use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::view::{select_form, ScorerForm};
use crate::api::models::{
    BallCompletedEvent, Innings, InningsOvers, InningsState, LiveScore, MatchHeader, MatchSnapshot,
};
use crate::api::{ApiError, MatchBackend};
use crate::live::LiveEvent;

/// Which innings counts as "current".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CurrentInningsPolicy {
    /// Always the first innings in the list (historical behaviour).
    #[default]
    FirstListed,
    /// The innings whose state is `IN_PROGRESS`, otherwise the last one.
    #[value(name = "in-progress")]
    InProgressOrLatest,
}

impl CurrentInningsPolicy {
    pub fn pick<'a>(self, snapshot: &'a MatchSnapshot) -> Option<&'a Innings> {
        match self {
            CurrentInningsPolicy::FirstListed => snapshot.innings.first(),
            CurrentInningsPolicy::InProgressOrLatest => snapshot
                .innings
                .iter()
                .find(|i| i.state == InningsState::InProgress)
                .or_else(|| snapshot.innings.last()),
        }
    }
}

/// A value plus the sequence number it was applied under.
#[derive(Debug, Clone)]
struct Slot<T> {
    seq: u64,
    value: T,
}

/// Whether the slot already holds a result from a fetch started at or after `seq`.
fn is_stale<T>(slot: &Option<Slot<T>>, seq: u64) -> bool {
    slot.as_ref().is_some_and(|s| s.seq >= seq)
}

/// Store `value` unless the slot already holds something newer. Returns whether it was applied.
fn apply_newer<T>(slot: &mut Option<Slot<T>>, seq: u64, value: T) -> bool {
    if is_stale(slot, seq) {
        return false;
    }
    *slot = Some(Slot { seq, value });
    true
}

#[derive(Debug, Default)]
struct MatchData {
    header: Option<Slot<MatchHeader>>,
    snapshot: Option<Slot<MatchSnapshot>>,
    overs: Option<Slot<Vec<InningsOvers>>>,
    ball_events: Option<Slot<Vec<BallCompletedEvent>>>,
    live_score: Option<Slot<LiveScore>>,
    error: Option<String>,
    in_flight: usize,
}

/// Striker and non-striker of the current innings. `None` ids mean "not yet selected".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentBatters {
    pub striker_id: Option<i64>,
    pub striker: Option<String>,
    pub non_striker_id: Option<i64>,
    pub non_striker: Option<String>,
}

/// Read-only copy of everything the aggregator holds, plus the selected form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub match_id: String,
    pub header: Option<MatchHeader>,
    pub snapshot: Option<MatchSnapshot>,
    pub current_innings: Option<Innings>,
    pub form: ScorerForm,
    pub ball_events: Vec<BallCompletedEvent>,
    pub live_score: Option<LiveScore>,
    pub error: Option<String>,
    pub loading: bool,
}

/// Owns the canonical header and snapshot of one match.
///
/// Every fetch and every push update draws a ticket from one monotonic counter
/// before it suspends; a result is only applied if its ticket is newer than the
/// one already applied to the same slot, so a slow response can never overwrite
/// fresher state.
pub struct MatchAggregator {
    match_id: String,
    backend: Arc<dyn MatchBackend>,
    policy: CurrentInningsPolicy,
    next_seq: AtomicU64,
    data: RwLock<MatchData>,
}

impl MatchAggregator {
    pub fn new(
        match_id: impl Into<String>,
        backend: Arc<dyn MatchBackend>,
        policy: CurrentInningsPolicy,
    ) -> Self {
        MatchAggregator {
            match_id: match_id.into(),
            backend,
            policy,
            next_seq: AtomicU64::new(1),
            data: RwLock::new(MatchData::default()),
        }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    fn ticket(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Fetch header and snapshot concurrently, clearing any previous error first.
    pub async fn refresh(&self) {
        self.data.write().await.error = None;
        self.refetch().await;
    }

    /// Fetch header and snapshot without touching the error field, so a failed
    /// command's message survives the follow-up refetch.
    pub async fn refetch(&self) {
        self.data.write().await.in_flight += 1;
        tokio::join!(self.fetch_header(), self.fetch_snapshot());
        let mut data = self.data.write().await;
        data.in_flight = data.in_flight.saturating_sub(1);
    }

    async fn fetch_header(&self) {
        let seq = self.ticket();
        let result = self.backend.match_header(&self.match_id).await;
        let mut data = self.data.write().await;
        match result {
            Ok(header) => {
                if !apply_newer(&mut data.header, seq, header) {
                    debug!("Discarded stale match header (seq {})", seq);
                }
            }
            Err(e) if is_stale(&data.header, seq) => {
                debug!("Discarded stale match header failure (seq {}): {}", seq, e);
            }
            Err(e) => {
                warn!("Failed to load match header for {}: {}", self.match_id, e);
                data.error = Some(e.message().to_string());
            }
        }
    }

    async fn fetch_snapshot(&self) {
        let seq = self.ticket();
        let result = self.backend.live_match(&self.match_id).await;
        let mut data = self.data.write().await;
        match result {
            Ok(snapshot) => {
                self.check_policy(&snapshot);
                if apply_newer(&mut data.snapshot, seq, snapshot) {
                    debug!("Applied match snapshot (seq {})", seq);
                } else {
                    debug!("Discarded stale match snapshot (seq {})", seq);
                }
            }
            Err(e) if is_stale(&data.snapshot, seq) => {
                debug!("Discarded stale match snapshot failure (seq {}): {}", seq, e);
            }
            Err(e) => {
                warn!("Failed to load match data for {}: {}", self.match_id, e);
                data.error = Some(e.message().to_string());
            }
        }
    }

    fn check_policy(&self, snapshot: &MatchSnapshot) {
        if self.policy != CurrentInningsPolicy::FirstListed {
            return;
        }
        let first = CurrentInningsPolicy::FirstListed.pick(snapshot);
        let live = CurrentInningsPolicy::InProgressOrLatest.pick(snapshot);
        if let (Some(first), Some(live)) = (first, live) {
            if !std::ptr::eq(first, live) {
                warn!(
                    "Current innings is the first listed ('{}') but '{}' is the live one; \
                     run with --current-innings in-progress to follow it",
                    first.title, live.title
                );
            }
        }
    }

    /// Fetch the over-by-over breakdown. Independent of `refresh()`.
    pub async fn fetch_overs(&self) -> Result<Vec<InningsOvers>, ApiError> {
        let seq = self.ticket();
        let result = self.backend.overs(&self.match_id).await;
        let mut data = self.data.write().await;
        match result {
            Ok(overs) => {
                apply_newer(&mut data.overs, seq, overs);
                Ok(data.overs.as_ref().map(|s| s.value.clone()).unwrap_or_default())
            }
            Err(e) => {
                warn!("Failed to load overs for {}: {}", self.match_id, e);
                if !is_stale(&data.overs, seq) {
                    data.error = Some(e.message().to_string());
                }
                Err(e)
            }
        }
    }

    /// Replace the ball-event list or live score with a pushed value.
    pub async fn apply_live_event(&self, event: LiveEvent) {
        let seq = self.ticket();
        let mut data = self.data.write().await;
        match event {
            LiveEvent::BallEvents(events) => {
                if let Some(last) = events.last() {
                    info!(
                        "Ball {}.{}: {} (team runs {})",
                        last.over_number, last.number_in_over, last.text, last.team_runs
                    );
                }
                apply_newer(&mut data.ball_events, seq, events);
            }
            LiveEvent::Score(score) => {
                if !score.message.is_empty() {
                    info!("Live score: {}", score.message);
                }
                apply_newer(&mut data.live_score, seq, score);
            }
        }
    }

    /// Record a failure that happened outside the aggregator (e.g. a scoring command).
    pub async fn record_error(&self, message: impl Into<String>) {
        self.data.write().await.error = Some(message.into());
    }

    pub async fn clear_error(&self) {
        self.data.write().await.error = None;
    }

    pub async fn error(&self) -> Option<String> {
        self.data.read().await.error.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.data.read().await.in_flight > 0
    }

    pub async fn header(&self) -> Option<MatchHeader> {
        self.data.read().await.header.as_ref().map(|s| s.value.clone())
    }

    pub async fn snapshot(&self) -> Option<MatchSnapshot> {
        self.data.read().await.snapshot.as_ref().map(|s| s.value.clone())
    }

    pub async fn current_innings(&self) -> Option<Innings> {
        let data = self.data.read().await;
        let snapshot = &data.snapshot.as_ref()?.value;
        self.policy.pick(snapshot).cloned()
    }

    pub async fn current_batters(&self) -> Option<CurrentBatters> {
        self.current_innings().await.map(|i| CurrentBatters {
            striker_id: i.current_striker_id,
            striker: i.current_striker.filter(|s| !s.is_empty()),
            non_striker_id: i.current_non_striker_id,
            non_striker: i.current_non_striker.filter(|s| !s.is_empty()),
        })
    }

    pub async fn over_completed(&self) -> bool {
        self.current_innings()
            .await
            .is_some_and(|i| i.over_completed == Some(true))
    }

    pub async fn form(&self) -> ScorerForm {
        let data = self.data.read().await;
        let snapshot = data.snapshot.as_ref().map(|s| &s.value);
        select_form(snapshot, snapshot.and_then(|s| self.policy.pick(s)))
    }

    pub async fn overs(&self) -> Option<Vec<InningsOvers>> {
        self.data.read().await.overs.as_ref().map(|s| s.value.clone())
    }

    pub async fn view(&self) -> MatchView {
        let data = self.data.read().await;
        let snapshot = data.snapshot.as_ref().map(|s| &s.value);
        let innings = snapshot.and_then(|s| self.policy.pick(s));
        MatchView {
            match_id: self.match_id.clone(),
            header: data.header.as_ref().map(|s| s.value.clone()),
            snapshot: snapshot.cloned(),
            current_innings: innings.cloned(),
            form: select_form(snapshot, innings),
            ball_events: data
                .ball_events
                .as_ref()
                .map(|s| s.value.clone())
                .unwrap_or_default(),
            live_score: data.live_score.as_ref().map(|s| s.value.clone()),
            error: data.error.clone(),
            loading: data.in_flight > 0,
        }
    }
}
