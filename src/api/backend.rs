use async_trait::async_trait;

use super::client::ApiError;
use super::models::{
    CreateMatchRequest, DismissalRequest, InningsOvers, MatchHeader, MatchSnapshot, TeamPlayers,
};

/// Operations the scoring console needs from the match backend.
///
/// `ApiClient` is the HTTP implementation; tests substitute an in-memory fake.
#[async_trait]
pub trait MatchBackend: Send + Sync {
    /// Header card for a match (teams, venue, toss, embedded live score).
    async fn match_header(&self, match_id: &str) -> Result<MatchHeader, ApiError>;

    /// Full live snapshot: match state plus every innings in chronological order.
    async fn live_match(&self, match_id: &str) -> Result<MatchSnapshot, ApiError>;

    /// Over-by-over breakdown of every innings.
    async fn overs(&self, match_id: &str) -> Result<Vec<InningsOvers>, ApiError>;

    /// Both squads of a live match.
    async fn players(&self, match_id: &str) -> Result<TeamPlayers, ApiError>;

    async fn create_live_match(&self, request: &CreateMatchRequest) -> Result<(), ApiError>;

    async fn start_innings(&self, match_id: &str, team_id: i64) -> Result<(), ApiError>;

    async fn start_over(&self, match_id: &str, bowler_id: i64) -> Result<(), ApiError>;

    async fn start_batter(&self, match_id: &str, batter_id: i64) -> Result<(), ApiError>;

    async fn complete_ball(&self, match_id: &str, outcome: &str) -> Result<(), ApiError>;

    async fn complete_ball_dismissal(
        &self,
        match_id: &str,
        request: &DismissalRequest,
    ) -> Result<(), ApiError>;

    /// Reverse the most recent scoring action server-side.
    async fn undo(&self, match_id: &str) -> Result<(), ApiError>;
}
