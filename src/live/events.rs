use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::subscriber::TopicHandler;
use crate::api::models::{BallCompletedEvent, LiveScore};

/// A push update from the realtime channel. Each one replaces the matching
/// client-side cache wholesale.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Latest ball events, as the fixed-size list the backend keeps.
    BallEvents(Vec<BallCompletedEvent>),
    Score(LiveScore),
}

pub fn ball_events_topic(match_id: &str) -> String {
    format!("/topic/match/{}", match_id)
}

pub fn live_score_topic(match_id: &str) -> String {
    format!("/topic/live-score/{}", match_id)
}

/// Ball-event payloads must be arrays; anything else is ignored.
pub fn decode_ball_events(value: Value) -> Option<Vec<BallCompletedEvent>> {
    if !value.is_array() {
        debug!("Ignoring non-array ball events payload");
        return None;
    }
    match serde_json::from_value(value) {
        Ok(events) => Some(events),
        Err(e) => {
            warn!("[Realtime] Malformed ball events payload: {}", e);
            None
        }
    }
}

pub fn decode_live_score(value: Value) -> Option<LiveScore> {
    match serde_json::from_value(value) {
        Ok(score) => Some(score),
        Err(e) => {
            warn!("[Realtime] Malformed live score payload: {}", e);
            None
        }
    }
}

/// Topic handlers for one match, forwarding decoded events into `sink`.
pub fn match_topics(match_id: &str, sink: mpsc::UnboundedSender<LiveEvent>) -> Vec<TopicHandler> {
    let ball_sink = sink.clone();
    vec![
        TopicHandler::new(ball_events_topic(match_id), move |value| {
            if let Some(events) = decode_ball_events(value) {
                let _ = ball_sink.send(LiveEvent::BallEvents(events));
            }
        }),
        TopicHandler::new(live_score_topic(match_id), move |value| {
            if let Some(score) = decode_live_score(value) {
                let _ = sink.send(LiveEvent::Score(score));
            }
        }),
    ]
}
