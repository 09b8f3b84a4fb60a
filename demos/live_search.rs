//! Live search against the real sources over your own proxies.
//!
//! Proxies are read from `PATENTBRIDGE_PROXIES` (comma or newline separated)
//! and settings from an optional JSON file given as the second argument.
//!
//! Run with:
//! PATENTBRIDGE_PROXIES=http://proxy1:8080,http://proxy2:8080 \
//!     cargo run --example live_search -- "darolutamide patent" [settings.json]

use patentbridge::prelude::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,patentbridge=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let query = args.next().unwrap_or_else(|| "darolutamide patent".to_string());
    let config = match args.next() {
        Some(path) => AcquisitionConfig::from_json_file(path)?,
        None => AcquisitionConfig::default(),
    };

    let resources = ResourceList::from_env("PATENTBRIDGE_PROXIES");
    if resources.is_empty() {
        eprintln!("Set PATENTBRIDGE_PROXIES to at least one proxy URL");
        std::process::exit(2);
    }
    println!("Using {} resources: {:?}", resources.len(), resources.labels());

    let pool = config.build_pool();
    pool.add(resources);

    let transport = HttpTransport::new(config.http.clone())?;
    let fetcher = config.build_fetcher(Arc::clone(&pool), Arc::new(transport))?;

    let outcome = fetcher.execute(&query).await?;
    println!("\n{:?} after {} requests", outcome.termination, outcome.request_count());
    for value in outcome.values() {
        println!("  {value}");
    }

    if let Some(first) = outcome.values().first() {
        let detail = fetcher.fetch_detail(first).await?;
        println!("\nDerived from {first}: {:?}", detail.values());
    }

    let status = pool.status();
    println!(
        "\nPool: {}/{} healthy, success rate {:.0}%",
        status.healthy,
        status.total,
        status.global_success_rate * 100.0
    );

    Ok(())
}
