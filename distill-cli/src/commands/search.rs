use super::stores::open_stores;
use anyhow::{Context, Result};
use distill::presentation::{present_aggregate, BaseUrlLinks};
use distill::{CollectionRegistry, CollectionSearch, Config, SearchAggregator};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Search all matching collections and print the aggregate document
pub async fn run_search(
    config: &Config,
    raw_query: &str,
    page: Option<usize>,
    page_size: Option<usize>,
    show_metrics: bool,
) -> Result<()> {
    let prometheus = if show_metrics {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    let dir = &config.registry.collections_dir;
    let registry = Arc::new(
        CollectionRegistry::load_dir(dir)
            .with_context(|| format!("Failed to load collections from {:?}", dir))?,
    );
    let executor = Arc::new(open_stores(&registry));
    if executor.unavailable() > 0 {
        warn!(
            "{} of {} collections have no usable data",
            executor.unavailable(),
            registry.len()
        );
    }

    let search = CollectionSearch::new(registry.clone(), executor);
    let aggregator = SearchAggregator::new(search, config.search.aggregator());
    let page = config.search.page(page, page_size);

    let start = Instant::now();
    let result = aggregator.search_all(raw_query, registry.all(), &page).await;
    info!(
        "Search finished in {:?}: {} hits across {} collections",
        start.elapsed(),
        result.count,
        result.results.len()
    );

    let links = BaseUrlLinks::new(&config.links.base_url);
    println!(
        "{}",
        serde_json::to_string_pretty(&present_aggregate(&result, &links))?
    );

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }

    Ok(())
}
