use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use route_impact::engine::{Engine, EngineConfig, IncidentQuery};
use route_impact::feed::DirectorySource;
use route_impact::matcher::{MatchingTables, tyne_and_wear};

/// How often to check the feed for a newer snapshot (1 hour).
const FEED_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Reads incidents as JSON lines on stdin and writes each one back with a
/// `routeMatch` field on stdout.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let feed_dir = std::env::var("FEED_DIR").unwrap_or_else(|_| "gtfs".to_string());
    let tables = match std::env::var("MATCHING_TABLES") {
        Ok(path) => MatchingTables::from_json_file(&path).expect("Failed to load matching tables"),
        Err(_) => tyne_and_wear(),
    };

    let engine = Engine::new(
        EngineConfig::default(),
        Arc::new(DirectorySource::new(&feed_dir)),
        tables,
    );

    match engine.initialize().await {
        Ok(snapshot) => info!(
            feed_dir = %feed_dir,
            routes = snapshot.route_count(),
            stops = snapshot.stops().len(),
            "Transit feed ready"
        ),
        Err(e) => warn!(feed_dir = %feed_dir, error = %e, "Starting without transit feed, text matching only"),
    }

    // Keep the snapshot fresh between incidents
    let refresh = engine.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FEED_REFRESH_INTERVAL);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            interval.tick().await;
            if let Err(e) = refresh.ensure_loaded().await {
                warn!(error = %e, "Feed refresh failed");
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut count = 0u64;

    while let Some(line) = lines.next_line().await.expect("Failed to read stdin") {
        if line.trim().is_empty() {
            continue;
        }
        let Some(enriched) = enrich(&engine, &line).await else {
            continue;
        };
        stdout
            .write_all(format!("{enriched}\n").as_bytes())
            .await
            .expect("Failed to write stdout");
        count += 1;
    }
    stdout.flush().await.expect("Failed to flush stdout");

    info!(incidents = count, stats = ?engine.statistics().await, "Done");
}

/// Match one incident line. Lines that are not JSON objects are skipped.
async fn enrich(engine: &Engine, line: &str) -> Option<Value> {
    let mut record: Value = match serde_json::from_str(line) {
        Ok(record @ Value::Object(_)) => record,
        Ok(_) => {
            warn!("Skipping incident line that is not a JSON object");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Skipping malformed incident line");
            return None;
        }
    };

    let query: IncidentQuery = match serde_json::from_value(record.clone()) {
        Ok(query) => query,
        Err(e) => {
            warn!(error = %e, "Skipping incident with unusable fields");
            return None;
        }
    };

    let matched = engine.match_incident(&query).await;
    let matched = match serde_json::to_value(matched) {
        Ok(matched) => matched,
        Err(e) => {
            warn!(error = %e, "Skipping incident whose match could not be serialized");
            return None;
        }
    };
    if let Value::Object(fields) = &mut record {
        fields.insert("routeMatch".to_string(), matched);
    }
    Some(record)
}
