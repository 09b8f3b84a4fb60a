//! Cascade example against a scripted transport.
//!
//! This example shows how to:
//! - Fill a resource pool with proxies
//! - Build a CascadingFetcher with the built-in strategy catalog
//! - Watch the cascade fall through empty sources and retry a rate limit
//! - Inspect the per-strategy reports and pool health
//!
//! Run with: cargo run --example cascade_search

use patentbridge::prelude::*;
use patentbridge::transport::MockReply;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Patentbridge Cascade Example ===\n");

    // Three proxies; the second one is dead
    let pool = Arc::new(ResourcePool::new(PoolConfig::default().with_quarantine_threshold(2)));
    pool.add([
        "http://10.0.0.1:8080",
        "http://10.0.0.2:8080",
        "http://10.0.0.3:8080",
    ]);

    // Google sources find nothing, Espacenet throttles once and then answers
    let transport = MockTransport::new()
        .with_name("scripted")
        .with_failing_resource("http://10.0.0.2:8080")
        .with_body("patents.google.com", "<html>No results</html>")
        .with_body("www.google.com", "<html>No results</html>")
        .with_sequence(
            "espacenet",
            vec![
                MockReply::rate_limited(Some(Duration::from_millis(200))),
                MockReply::ok(r#"{"results": ["WO 2016/162604 A1", "WO2018162793"]}"#),
            ],
        );

    let config = CascadeConfig::default()
        .with_retry(RetryConfig::default().with_backoff(
            patentbridge::fetcher::BackoffPolicy::new()
                .with_base(Duration::from_millis(100))
                .with_jitter_max(Duration::from_millis(50))
                .with_rate_limit_base(Duration::from_millis(100)),
        ))
        .with_inter_strategy_pause(Duration::from_millis(100));

    let fetcher = CascadingFetcher::builder()
        .with_pool(Arc::clone(&pool))
        .with_transport(transport)
        .with_builtin_strategies()
        .with_config(config)
        .build()?;

    println!("Search strategies: {:?}\n", fetcher.search_strategy_names());

    let outcome = fetcher.execute("darolutamide patent").await?;

    println!("\n=== Cascade Outcome ===");
    println!("Query: {}", outcome.query);
    println!("Termination: {:?}", outcome.termination);
    println!("Identifiers: {:?}", outcome.values());
    println!("Requests sent: {}", outcome.request_count());
    println!("Duration: {:?}", outcome.duration);

    println!("\nStrategies:");
    for report in &outcome.strategies {
        println!(
            "  {:<20} {:?} (attempts: {}, requests: {})",
            report.strategy, report.outcome, report.attempts, report.requests
        );
    }

    println!("\nPool health:");
    for health in pool.snapshot() {
        println!(
            "  {:<24} ok: {:<3} failed: {:<3} quarantined: {}",
            health.label, health.success_count, health.failure_count, health.quarantined
        );
    }

    let stats = fetcher.stats();
    println!("\nGlobal success rate: {:.0}%", stats.success_rate() * 100.0);

    Ok(())
}
