use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::api::models::InningsOvers;
use crate::db::SessionStore;
use crate::live::ConnectionStatus;
use crate::scoring::{MatchAggregator, MatchView};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<MatchAggregator>,
    pub connection: watch::Receiver<ConnectionStatus>,
    pub session: SessionStore,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    #[serde(flatten)]
    pub view: MatchView,
    pub connection: ConnectionStatus,
    pub dark_mode: bool,
    /// Over lists from the last `/api/overs` request, if any
    pub overs: Option<Vec<InningsOvers>>,
}

/// Build the read-only Axum router for the scoreboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/state", get(state_handler))
        .route("/api/overs", get(overs_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Serve the scoreboard page, injecting the stored theme.
async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let theme = if dark_mode(&state) { "dark" } else { "light" };
    Html(SCOREBOARD_HTML.replace("<body>", &format!(r#"<body data-theme="{}">"#, theme)))
}

/// GET /api/state
async fn state_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let view = state.aggregator.view().await;
    let overs = state.aggregator.overs().await;
    let connection = state.connection.borrow().clone();
    Json(StateResponse {
        view,
        connection,
        dark_mode: dark_mode(&state),
        overs,
    })
}

/// GET /api/overs, fetched from the backend on every request
async fn overs_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .aggregator
        .fetch_overs()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}

fn dark_mode(state: &AppState) -> bool {
    state.session.dark_mode().unwrap_or_else(|e| {
        warn!("Could not read theme from session store: {}", e);
        false
    })
}

/// Embedded single-file scoreboard (HTML + CSS + JS)
const SCOREBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Live Scorer</title>
<style>
  body[data-theme="dark"] { --bg: #0f1117; --card: #1a1d27; --border: #2a2d3a; --text: #e0e0e0; --muted: #8888aa; }
  body[data-theme="light"] { --bg: #f5f6fa; --card: #ffffff; --border: #d8dae5; --text: #1a1d27; --muted: #666688; }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.3rem; }
  .badge { padding: .2rem .6rem; border-radius: 4px; font-size: .75rem; font-weight: 700; text-transform: uppercase; background: var(--border); }
  .badge.connected { background: #00c896; color: #000; }
  main { padding: 1.5rem 2rem; display: grid; gap: 1.2rem; }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; padding: 1rem 1.2rem; }
  .panel h2 { font-size: .8rem; text-transform: uppercase; color: var(--muted); margin-bottom: .6rem; }
  .error { color: #ff4f6a; }
  table { width: 100%; border-collapse: collapse; font-size: .88rem; }
  td, th { padding: .4rem .6rem; text-align: left; border-bottom: 1px solid var(--border); }
</style>
</head>
<body>
<header>
  <h1 id="title">Live Scorer</h1>
  <span id="conn" class="badge">idle</span>
  <span id="form" class="badge"></span>
</header>
<main>
  <div class="panel"><h2>Score</h2><div id="score">Loading…</div><div id="error" class="error"></div></div>
  <div class="panel"><h2>Batting</h2><table id="batters"></table></div>
  <div class="panel"><h2>Bowling</h2><table id="bowlers"></table></div>
  <div class="panel"><h2>Recent balls</h2><table id="balls"></table></div>
</main>
<script>
const esc = s => String(s ?? '').replace(/[&<>]/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;'}[c]));
async function load() {
  const r = await fetch('/api/state');
  if (!r.ok) return;
  const s = await r.json();
  const h = s.header;
  if (h) document.getElementById('title').textContent = `${h.teamA} v ${h.teamB}`;
  const conn = document.getElementById('conn');
  conn.textContent = s.connection.status;
  conn.className = 'badge ' + s.connection.status;
  document.getElementById('form').textContent = s.form.form.replace(/_/g, ' ');
  document.getElementById('error').textContent = s.error ?? '';
  const inn = s.currentInnings;
  document.getElementById('score').textContent = s.liveScore?.message
    || (inn ? `${inn.title} ${inn.currentScore ?? inn.total}` : 'Waiting for match data');
  document.getElementById('batters').innerHTML = (inn?.batters ?? []).map(b =>
    `<tr><td>${esc(b.name)}</td><td>${esc(b.dismissal)}</td><td>${esc(b.runs)} (${esc(b.balls)})</td></tr>`).join('');
  document.getElementById('bowlers').innerHTML = (inn?.bowlers ?? []).map(b =>
    `<tr><td>${esc(b.name)}</td><td>${esc(b.overs)}-${esc(b.runsConceded)}-${esc(b.wickets)}</td></tr>`).join('');
  document.getElementById('balls').innerHTML = (s.ballEvents ?? []).slice().reverse().map(e =>
    `<tr><td>${e.overNumber}.${e.numberInOver}</td><td>${esc(e.text)}</td><td>${e.teamRuns}</td></tr>`).join('');
}
load();
setInterval(load, 3000);
</script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::testing::FakeBackend;
    use crate::scoring::CurrentInningsPolicy;

    async fn serve() -> (String, Arc<FakeBackend>, watch::Sender<ConnectionStatus>) {
        let backend = Arc::new(FakeBackend::default());
        let aggregator = Arc::new(MatchAggregator::new(
            "m-1",
            backend.clone(),
            CurrentInningsPolicy::FirstListed,
        ));
        aggregator.refresh().await;
        let session = SessionStore::open(":memory:").unwrap();
        session.set_dark_mode(true).unwrap();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connected);
        let app = router(AppState {
            aggregator,
            connection: status_rx,
            session,
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), backend, status_tx)
    }

    #[tokio::test]
    async fn state_reports_view_connection_and_theme() {
        let (base, _backend, status_tx) = serve().await;
        let body: serde_json::Value = reqwest::get(format!("{}/api/state", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["matchId"], "m-1");
        assert_eq!(body["form"]["form"], "scoring_controls");
        assert_eq!(body["connection"]["status"], "connected");
        assert_eq!(body["darkMode"], true);

        status_tx.send_replace(ConnectionStatus::Reconnecting {
            attempt: 2,
            retry_in_ms: 2000,
        });
        let body: serde_json::Value = reqwest::get(format!("{}/api/state", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["connection"]["status"], "reconnecting");
        assert_eq!(body["connection"]["retry_in_ms"], 2000);
    }

    #[tokio::test]
    async fn overs_are_fetched_only_on_request() {
        let (base, backend, _status_tx) = serve().await;
        assert_eq!(backend.count("overs"), 0);
        let body: serde_json::Value = reqwest::get(format!("{}/api/overs", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body[0]["teamName"], "Lions");
        assert_eq!(backend.count("overs"), 1);

        let state: serde_json::Value = reqwest::get(format!("{}/api/state", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(state["overs"][0]["overs"][0]["balls"][1], "4");
        assert_eq!(backend.count("overs"), 1);
    }

    #[tokio::test]
    async fn index_carries_theme() {
        let (base, _backend, _status_tx) = serve().await;
        let html = reqwest::get(format!("{}/", base)).await.unwrap().text().await.unwrap();
        assert!(html.contains(r#"data-theme="dark""#));
    }
}
