//! Batch search example: a full query plan plus detail resolution.
//!
//! This example shows how to:
//! - Build the standard query plan for a molecule
//! - Load settings from JSON and credentials from a key list
//! - Run every query, resolve WO numbers into BR numbers and merge the records
//!
//! Run with: cargo run --example batch_search

use patentbridge::prelude::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const SETTINGS: &str = r#"{
    "pool": { "quarantine_threshold": 3, "quarantine_duration_ms": 60000 },
    "cascade": {
        "inter_strategy_pause_ms": 50,
        "detail_inter_strategy_pause_ms": 50,
        "retry": { "max_attempts": 2, "backoff": { "base_ms": 50, "jitter_max_ms": 10 } }
    },
    "batch": { "concurrency": 2, "inter_query_pause_ms": 100, "inter_detail_pause_ms": 50 }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Patentbridge Batch Search Example ===\n");

    let config = AcquisitionConfig::from_json(SETTINGS)?;

    // Keys come from the environment in production; two fake ones here
    let resources = ResourceList::from_env("PATENTBRIDGE_KEYS")
        .merge(ResourceList::from_api_keys("serpapi", ["demo-key-one", "demo-key-two"]));
    println!("Resources: {:?}", resources.labels());

    let pool = config.build_pool();
    pool.add(resources);

    let transport = MockTransport::new()
        .with_body("q=darolutamide+patent", "WO2011051540 WO 2016/162604")
        .with_body("q=darolutamide+WO2018", "<td>WO2018162793A1</td>")
        .with_body("patent/WO2016162604", "Also published as BR112017024082A2")
        .with_body("patent/WO2011051540", "BR 112012008823 and BR112012008823")
        .with_body("pn=WO2018162793", "BR112019018449");

    let fetcher = Arc::new(config.build_fetcher(pool, Arc::new(transport))?);
    let batch = BatchSearch::with_config(fetcher, config.batch.clone());

    let plan = QueryPlan::for_subject("darolutamide", &["ODM-201", "BAY-1841788"]);
    println!("Plan: {} queries\n", plan.len());

    let report = batch.run(&plan).await?;

    println!("\n=== Batch Report ===");
    println!("Batch ID: {}", report.id);
    println!("Queries without results: {:?}", report.empty_queries());
    println!("Primary (WO): {:?}", report.primary);
    println!("Derived (BR): {:?}", report.derived);

    println!("\nRecords:");
    for record in &report.records {
        println!(
            "  {:<16} parent: {:<14} sources: {}",
            record.key,
            record.parent.as_deref().unwrap_or("-"),
            record.sources.join(", ")
        );
    }

    println!(
        "\nPool: {}/{} healthy, {} requests, success rate {:.0}%",
        report.pool_status.healthy,
        report.pool_status.total,
        report.pool_status.total_requests,
        report.pool_status.global_success_rate * 100.0
    );
    println!("Cascades: {} ({} found)", report.stats.cascades, report.stats.cascades_found);
    println!("Duration: {:?}", report.duration);

    Ok(())
}
