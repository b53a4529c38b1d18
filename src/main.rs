//! Replay driver: feeds newline-delimited JSON events from stdin through the
//! matcher and dumps the accumulated counters at EOF.

use postmatch::{
    Config, EventMatcher, LoggingBanker, MatcherService, OutcomeSinks, PostAuctionEvent,
    StatsRegistry, SubmittedAuctionEvent,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ReplayLine {
    SubmittedAuction(SubmittedAuctionEvent),
    PostAuction(PostAuctionEvent),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let stats = Arc::new(StatsRegistry::new());
    let banker = Arc::new(LoggingBanker::new());
    let sinks = OutcomeSinks::new()
        .on_matched_win_loss(|outcome| {
            tracing::info!(
                kind = ?outcome.kind,
                confidence = ?outcome.confidence,
                auction = %outcome.info.auction_id,
                spot = %outcome.info.ad_spot_id,
                price = %outcome.info.price,
                "matched win/loss"
            );
        })
        .on_matched_campaign_event(|outcome| {
            tracing::info!(
                label = %outcome.label,
                auction = %outcome.info.auction_id,
                "matched campaign event"
            );
        })
        .on_unmatched_event(|outcome| {
            tracing::warn!(
                reason = %outcome.reason,
                auction = %outcome.event.auction_id,
                "unmatched event"
            );
        });

    let telemetry: Arc<dyn postmatch::Telemetry> = Arc::clone(&stats) as Arc<dyn postmatch::Telemetry>;
    let matcher = EventMatcher::new(config, banker, telemetry, sinks);
    let service = MatcherService::spawn(matcher, config.sweep_interval_ms);
    let handle = service.handle();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u64;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                line_no += 1;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ReplayLine>(line) {
                    Ok(ReplayLine::SubmittedAuction(event)) => {
                        if handle.submit_auction(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(ReplayLine::PostAuction(event)) => {
                        if handle.submit_event(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(line = line_no, error = %e, "skipping malformed event");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("Failed to read stdin: {}", e);
                std::process::exit(1);
            }
        }
    }

    let matcher = match service.shutdown().await {
        Ok(matcher) => matcher,
        Err(e) => {
            eprintln!("Matcher loop failed: {}", e);
            std::process::exit(1);
        }
    };

    let totals = matcher.stats();
    tracing::info!(
        wins = totals.num_wins,
        losses = totals.num_losses,
        campaign_events = totals.num_campaign_events,
        "replay finished"
    );

    for (name, count) in stats.hits_snapshot() {
        println!("{} {}", name, count);
    }
}
