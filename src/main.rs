use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

mod api;
mod config;
mod console;
mod dashboard;
mod db;
mod live;
mod notify;
mod scoring;

use api::models::CreateMatchRequest;
use api::{ApiClient, ApiError, MatchBackend};
use config::Config;
use console::{ConsoleCommand, HELP};
use dashboard::AppState;
use db::SessionStore;
use live::{match_topics, LiveEvent, SubscriberConfig, Subscription};
use notify::{Alert, AlertSeverity, ChannelNotifier, Notifier};
use scoring::outcome::VOCABULARY;
use scoring::{CommandError, DismissalType, MatchAggregator, ScoringCommand, ScoringDispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open session store
    let session = SessionStore::open(&config.session_path)?;
    info!("Session store opened: {}", config.session_path);
    if let Some(token) = &config.auth_token {
        session.set_auth_token(token)?;
        info!("Auth token stored");
    }

    let (notifier, mut alerts) = ChannelNotifier::new();
    let client = ApiClient::new(
        &config.api_url,
        config.request_timeout(),
        Some(session.clone()),
        Some(Arc::new(notifier.clone())),
    )?;
    let backend: Arc<dyn MatchBackend> = Arc::new(client);

    let aggregator = Arc::new(MatchAggregator::new(
        config.match_id.clone(),
        backend.clone(),
        config.current_innings,
    ));
    let dispatcher = ScoringDispatcher::new(aggregator.clone(), backend);

    info!("Loading match {}", config.match_id);
    aggregator.refresh().await;
    print_summary(&aggregator).await;

    // Realtime updates
    let (events_tx, mut events) = mpsc::unbounded_channel::<LiveEvent>();
    let subscriber_config = SubscriberConfig::new(
        &config.ws_endpoint,
        config.max_reconnect_backoff(),
        config.debug_tools,
    )?;
    let mut subscription = Subscription::open(
        subscriber_config,
        match_topics(&config.match_id, events_tx.clone()),
    );
    let mut status = subscription.watch_status();

    // Start the dashboard HTTP server
    let app = dashboard::router(AppState {
        aggregator: aggregator.clone(),
        connection: subscription.watch_status(),
        session: session.clone(),
    });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Dashboard listening on http://{}", addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Dashboard server stopped: {}", e);
        }
    });

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                };
                let command = match console::parse_line(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("! {}", e);
                        continue;
                    }
                };
                match command {
                    ConsoleCommand::Quit => break,
                    ConsoleCommand::Status => {
                        println!("realtime: {:?}", subscription.status());
                        print_summary(&aggregator).await;
                    }
                    ConsoleCommand::Reconnect => {
                        subscription
                            .resubscribe(match_topics(&config.match_id, events_tx.clone()))
                            .await;
                        status = subscription.watch_status();
                    }
                    other => {
                        if let Err(e) = run_command(other, &dispatcher, &session, &notifier).await {
                            match console_message(&e) {
                                Some(message) => println!("! {}", message),
                                None => debug!("Command failed, alert already raised: {}", e),
                            }
                        }
                    }
                }
            }
            Some(event) = events.recv() => {
                aggregator.apply_live_event(event).await;
            }
            Some(alert) = alerts.recv() => {
                match alert.severity {
                    AlertSeverity::Error => println!("✖ {}", alert.message),
                    AlertSeverity::Success => println!("✔ {}", alert.message),
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    warn!("[Realtime] Status channel closed");
                    status = subscription.watch_status();
                    continue;
                }
                let current = status.borrow_and_update().clone();
                info!("[Realtime] Status: {:?}", current);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    subscription.close().await;
    info!("Scorer stopped");
    Ok(())
}

async fn run_command(
    command: ConsoleCommand,
    dispatcher: &ScoringDispatcher,
    session: &SessionStore,
    notifier: &dyn Notifier,
) -> Result<()> {
    let aggregator = dispatcher.aggregator();
    match command {
        ConsoleCommand::Score(command) => {
            match command {
                ScoringCommand::StartInnings { team_id } => dispatcher.start_inning(team_id).await?,
                ScoringCommand::StartOver { bowler_id } => dispatcher.start_over(bowler_id).await?,
                ScoringCommand::StartBatter { batter_id } => {
                    dispatcher.start_batter(batter_id).await?
                }
                ScoringCommand::AddScore { outcome } => dispatcher.add_score(&outcome).await?,
                ScoringCommand::AddScoreWithDismissal {
                    outcome,
                    dismissal,
                    fielder_id,
                } => {
                    dispatcher
                        .add_score_with_dismissal(&outcome, dismissal, fielder_id)
                        .await?
                }
                ScoringCommand::Undo => dispatcher.undo().await?,
            }
            print_summary(aggregator).await;
        }
        ConsoleCommand::Refresh => {
            aggregator.refresh().await;
            print_summary(aggregator).await;
        }
        ConsoleCommand::Overs => {
            for innings in aggregator.fetch_overs().await? {
                println!("{} (innings {})", innings.team_name, innings.innings_number);
                for over in &innings.overs {
                    println!(
                        "  {:>2}: {:<24} {}",
                        over.over_number,
                        over.balls.join(" "),
                        over.bowler_name
                    );
                }
            }
        }
        ConsoleCommand::Squads => {
            let squads = dispatcher.players().await?;
            for (label, players) in [("A", &squads.team_a_players), ("B", &squads.team_b_players)] {
                println!("Team {}:", label);
                for p in players {
                    println!("  {:>5}  {}", p.id, p.name);
                }
            }
        }
        ConsoleCommand::StartMatch(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Cannot read {}", path.display()))?;
            let request: CreateMatchRequest = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid fixture file {}", path.display()))?;
            dispatcher.create_live_match(&request).await?;
            notifier.notify(Alert::success(format!(
                "Live match created for fixture {}",
                request.match_id
            )));
        }
        ConsoleCommand::Theme { dark } => {
            session.set_dark_mode(dark)?;
            println!("Theme set to {}", if dark { "dark" } else { "light" });
        }
        ConsoleCommand::Logout => {
            session.clear_auth_token()?;
            println!("Auth token cleared");
        }
        ConsoleCommand::Keys => print_keys(),
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit | ConsoleCommand::Reconnect | ConsoleCommand::Status => {}
    }
    Ok(())
}

/// Text to print for a failed console command, or `None` when the failure
/// came from the backend and the client has already raised an alert for it.
fn console_message(err: &anyhow::Error) -> Option<String> {
    let alerted = err.chain().any(|cause| {
        cause.downcast_ref::<ApiError>().is_some()
            || matches!(cause.downcast_ref::<CommandError>(), Some(CommandError::Api(_)))
    });
    if alerted {
        None
    } else {
        Some(format!("{:#}", err))
    }
}

async fn print_summary(aggregator: &MatchAggregator) {
    if aggregator.is_loading().await {
        println!("(loading...)");
    }
    if let Some(header) = aggregator.header().await {
        println!("{} v {}", header.team_a, header.team_b);
    }
    if let Some(result) = aggregator.snapshot().await.and_then(|s| s.result) {
        println!("Result: {}", result);
    }
    if let Some(innings) = aggregator.current_innings().await {
        println!(
            "{}: {}",
            innings.title,
            innings.current_score.as_deref().unwrap_or(&innings.total)
        );
    }
    if let Some(batters) = aggregator.current_batters().await {
        println!(
            "  striker: {}  non-striker: {}",
            batters.striker.as_deref().unwrap_or("-"),
            batters.non_striker.as_deref().unwrap_or("-")
        );
    }
    if aggregator.over_completed().await {
        println!("  over complete");
    }
    println!("  next: {:?}", aggregator.form().await);
    if let Some(error) = aggregator.error().await {
        println!("  last error: {}", error);
    }
}

fn print_keys() {
    for option in VOCABULARY {
        let key = option.shortcut.map(String::from).unwrap_or_default();
        println!("  {:<4} {:<4} {:<8} {:?}", option.code, key, option.label, option.group);
    }
    println!("dismissals:");
    for dismissal in DismissalType::ALL {
        println!(
            "  {:<4} {:<22} bowler's wicket: {:<5} fielder: {}",
            dismissal.abbreviation(),
            dismissal,
            dismissal.credited_to_bowler(),
            dismissal.takes_fielder()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::scoring::CurrentInningsPolicy;
    use axum::{routing::get, routing::post, Json, Router};
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;

    async fn rejecting_backend(notifier: Arc<RecordingNotifier>) -> ScoringDispatcher {
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

        let client = ApiClient::new(
            &format!("http://{}", addr),
            Duration::from_secs(5),
            None,
            Some(notifier),
        )
        .unwrap();
        let backend: Arc<dyn MatchBackend> = Arc::new(client);
        let aggregator = Arc::new(MatchAggregator::new(
            "m-1",
            backend.clone(),
            CurrentInningsPolicy::FirstListed,
        ));
        ScoringDispatcher::new(aggregator, backend)
    }

    #[tokio::test]
    async fn backend_failures_surface_once_through_the_alert() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = rejecting_backend(notifier.clone()).await;
        let session = SessionStore::open(":memory:").unwrap();

        let over = ConsoleCommand::Score(ScoringCommand::StartOver { bowler_id: 9 });
        let err = run_command(over, &dispatcher, &session, notifier.as_ref())
            .await
            .unwrap_err();
        assert_eq!(console_message(&err), None);
        let alerts = notifier.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Bowler already used");

        // No players route: the transport failure is alerted, not printed
        let err = run_command(ConsoleCommand::Squads, &dispatcher, &session, notifier.as_ref())
            .await
            .unwrap_err();
        assert_eq!(console_message(&err), None);
        assert_eq!(notifier.alerts().len(), 2);
    }

    #[tokio::test]
    async fn local_failures_are_printed() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = rejecting_backend(notifier.clone()).await;
        let session = SessionStore::open(":memory:").unwrap();

        let missing = ConsoleCommand::StartMatch(PathBuf::from("/nonexistent/fixture.json"));
        let err = run_command(missing, &dispatcher, &session, notifier.as_ref())
            .await
            .unwrap_err();
        let message = console_message(&err).unwrap();
        assert!(message.starts_with("Cannot read /nonexistent/fixture.json"));
        assert!(notifier.alerts().is_empty());

        let busy = anyhow::Error::from(CommandError::Busy);
        assert_eq!(
            console_message(&busy).as_deref(),
            Some("Another scoring command is still in progress")
        );
    }
}
