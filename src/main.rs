use std::{sync::Arc, time::Duration};

use clap::Parser;
use clipscout::{
    cli::Args,
    logging,
    outside::{YtdlFetcher, YtdlSearch},
    pipeline::Pipeline,
    proxy::ProxyPool,
    services::{HttpDedup, HttpEmbedder},
};
use miette::{Context, IntoDiagnostic};
use tracing::info;

fn main() -> miette::Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_level)?;

    let (search, fetcher) = load_external_components()?;
    let fetcher: Arc<YtdlFetcher> = Arc::new(fetcher);

    let proxies = Arc::new(match &args.proxy_file {
        Some(path) => {
            let pool = ProxyPool::from_file(path, Duration::from_secs(args.proxy_refresh_secs))
                .map_err(miette::Report::from)
                .wrap_err("Could not load proxy pool")?;
            info!("Proxy pool loaded with {} entries", pool.len());
            pool
        }
        None => {
            info!("No proxy file given, downloads egress directly");
            ProxyPool::disabled()
        }
    });

    let dedup = Arc::new(HttpDedup::new(args.dedup_url.clone()));
    let embedder = Arc::new(HttpEmbedder::new(args.embed_url.clone()));

    let pipeline = Pipeline::new(
        Arc::new(search),
        dedup,
        args.scheduler(fetcher.clone(), proxies),
        Arc::new(args.selector(fetcher, embedder)),
        args.pipeline_config(),
    );

    let outcome = pipeline.run(&args.query, args.count);
    info!(
        "Produced {} of {} requested records",
        outcome.records.len(),
        args.count
    );

    serde_json::to_writer_pretty(std::io::stdout().lock(), &outcome.records)
        .into_diagnostic()
        .wrap_err("Could not serialize records")?;
    println!();

    Ok(())
}

/// Load the external components.
///
/// Construct the handles concurrently as executing an external program
/// is not instantaneous.
fn load_external_components() -> miette::Result<(YtdlSearch, YtdlFetcher)> {
    let search_thread = std::thread::spawn(YtdlSearch::new);
    let fetcher_thread = std::thread::spawn(YtdlFetcher::new);

    let search = search_thread
        .join()
        .expect("Could not join thread")
        .map_err(miette::Report::from)?;
    let fetcher = fetcher_thread
        .join()
        .expect("Could not join thread")
        .map_err(miette::Report::from)?;

    Ok((search, fetcher))
}
