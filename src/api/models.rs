use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard response envelope used by most backend endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Overall state of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchState {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// State of a single innings. Interruptions (drinks, lunch, ...) are passed
/// through as their own variants; anything unrecognised lands in `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InningsState {
    #[default]
    NotStarted,
    InProgress,
    BetweenOvers,
    Drinks,
    Lunch,
    Tea,
    RainDelay,
    Completed,
    #[serde(other)]
    Unknown,
}

/// Player reference used in squads, yet-to-bat lists and partnerships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_captain: Option<bool>,
    #[serde(default)]
    pub is_vice_captain: Option<bool>,
    #[serde(default)]
    pub is_wicket_keeper: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatterStats {
    pub name: String,
    #[serde(default)]
    pub dismissal: String,
    pub runs: u32,
    #[serde(default)]
    pub minutes: Option<u32>,
    pub balls: u32,
    #[serde(default)]
    pub fours: u32,
    #[serde(default)]
    pub sixes: u32,
    #[serde(default)]
    pub strike_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BowlerStats {
    pub name: String,
    pub overs: String,
    #[serde(default)]
    pub maidens: u32,
    pub runs_conceded: u32,
    pub wickets: u32,
    #[serde(default)]
    pub economy: String,
    #[serde(default)]
    pub dot_balls: u32,
    #[serde(default)]
    pub fours: u32,
    #[serde(default)]
    pub sixes: u32,
    #[serde(default)]
    pub wides: u32,
    #[serde(default)]
    pub no_balls: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallOfWicket {
    pub wickets: u32,
    pub team_runs: u32,
    pub batter_name: String,
    /// Over string like "14.2 ov", or a reason such as "retired"
    pub over_or_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatterContribution {
    pub player: PlayerInfo,
    pub runs: u32,
    pub balls: u32,
    pub strike_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partnership {
    pub wicket_number: u32,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    pub total_runs: u32,
    pub total_balls: u32,
    pub broken_by_wicket: bool,
    /// e.g. "IN_PROGRESS", "INNINGS_ENDED"
    pub state: String,
    #[serde(default)]
    pub batters: Vec<BatterContribution>,
}

/// One over as reported by the backend. `balls` holds the outcome tokens in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverSummary {
    pub over_number: u32,
    #[serde(default)]
    pub balls: Vec<String>,
    #[serde(default)]
    pub bowler_id: Option<i64>,
    #[serde(default)]
    pub bowler_name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub runs: String,
    #[serde(default)]
    pub team_runs: String,
    #[serde(default)]
    pub completed: bool,
}

/// All overs of one innings, returned by the lazily fetched overs endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InningsOvers {
    #[serde(default)]
    pub overs: Vec<OverSummary>,
    pub team_name: String,
    pub team_id: i64,
    pub innings_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Innings {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub batters: Vec<BatterStats>,
    #[serde(default)]
    pub extras: String,
    #[serde(default)]
    pub extras_total: u32,
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub yet_to_bat: Vec<PlayerInfo>,
    #[serde(default)]
    pub fall_of_wickets: Vec<FallOfWicket>,
    #[serde(default)]
    pub bowlers: Vec<BowlerStats>,
    #[serde(default)]
    pub current_score: Option<String>,
    #[serde(default)]
    pub over_completed: Option<bool>,
    #[serde(default)]
    pub state: InningsState,
    #[serde(default)]
    pub partnerships: Vec<Partnership>,
    #[serde(default)]
    pub bowling_team: Vec<PlayerInfo>,
    #[serde(default)]
    pub current_striker: Option<String>,
    #[serde(default)]
    pub current_striker_id: Option<i64>,
    #[serde(default)]
    pub current_non_striker: Option<String>,
    #[serde(default)]
    pub current_non_striker_id: Option<i64>,
    #[serde(default)]
    pub current_over: Option<OverSummary>,
}

/// Full live-match snapshot. Innings are in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub match_id: String,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub team_a: String,
    #[serde(default)]
    pub team_b: String,
    #[serde(default)]
    pub team_a_id: Option<i64>,
    #[serde(default)]
    pub team_b_id: Option<i64>,
    #[serde(default)]
    pub match_type: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub innings: Vec<Innings>,
    #[serde(default)]
    pub state: MatchState,
    #[serde(default)]
    pub team_a_players: Vec<PlayerInfo>,
    #[serde(default)]
    pub team_b_players: Vec<PlayerInfo>,
}

/// Score line of one innings inside a live-score push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InningsScore {
    pub batting_team: String,
    pub runs: u32,
    pub wickets: u32,
    #[serde(default)]
    pub over: Option<String>,
    #[serde(default)]
    pub striker: Option<String>,
    #[serde(default)]
    pub non_striker: Option<String>,
    #[serde(default)]
    pub bowler: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub crr: f64,
    #[serde(default)]
    pub rrr: Option<f64>,
    #[serde(default)]
    pub target: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveScore {
    #[serde(default)]
    pub all_innings: Vec<InningsScore>,
    #[serde(default)]
    pub message: String,
}

/// Match header card: teams, venue, toss and tournament details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchHeader {
    pub match_id: i64,
    #[serde(default)]
    pub live_match_id: String,
    pub team_a: String,
    #[serde(default)]
    pub team_a_logo: String,
    pub team_b: String,
    #[serde(default)]
    pub team_b_logo: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub toss_message: String,
    #[serde(default)]
    pub tournament_name: String,
    #[serde(default)]
    pub tournament_logo: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub live_score: Option<LiveScore>,
}

/// One delivery as pushed on the per-match ball-events topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallCompletedEvent {
    pub bowler_name: String,
    pub striker_name: String,
    pub non_striker_name: String,
    pub team_runs: u32,
    pub text: String,
    pub players_crossed: bool,
    #[serde(default)]
    pub dismissal_type: Option<String>,
    #[serde(default)]
    pub fielder_name: Option<String>,
    pub over_number: u32,
    pub number_in_over: u32,
    pub number_in_match: u32,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedPlayer {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_captain: bool,
    #[serde(default)]
    pub is_wicket_keeper: bool,
}

/// Both squads of a live match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPlayers {
    #[serde(default)]
    pub team_a_players: Vec<ListedPlayer>,
    #[serde(default)]
    pub team_b_players: Vec<ListedPlayer>,
}

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TossDecision {
    Bat,
    Bowl,
}

/// Payload that turns a scheduled fixture into a live match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    pub match_id: i64,
    pub team_a_players: Vec<i64>,
    pub team_b_players: Vec<i64>,
    pub team_a_captain_id: i64,
    pub team_a_vice_captain_id: i64,
    pub team_a_wicket_keeper_id: i64,
    pub team_b_captain_id: i64,
    pub team_b_vice_captain_id: i64,
    pub team_b_wicket_keeper_id: i64,
    pub elected_team_id: i64,
    pub elected_to: TossDecision,
    pub overs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInningsRequest {
    pub team_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOverRequest {
    pub bowler_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartBatterRequest {
    pub batter: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteBallRequest {
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DismissalRequest {
    pub outcome: String,
    pub dismissal_type: crate::scoring::DismissalType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fielder_id: Option<i64>,
}
