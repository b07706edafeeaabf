use anyhow::{Context, Result};
use distill::aggregator::select_collections;
use distill::backends::SchemaProvider;
use distill::{engine, fieldset};
use distill::{CollectionRegistry, Config, StructuredQuery};
use serde_json::json;

/// Print the parsed query, and with `explain` what each collection would receive
pub async fn run_parse(config: &Config, raw_query: &str, explain: bool) -> Result<()> {
    let query = StructuredQuery::parse(raw_query);
    println!("{}", serde_json::to_string_pretty(&query)?);

    if !explain {
        return Ok(());
    }

    let dir = &config.registry.collections_dir;
    let registry = CollectionRegistry::load_dir(dir)
        .with_context(|| format!("Failed to load collections from {:?}", dir))?;

    for collection in select_collections(&query, registry.all()) {
        let schema = registry.schema(collection).await?;
        let fieldsets = fieldset::build(&query, &schema);
        let engine_query = engine::translate(collection.backend, &fieldsets);
        let plan = json!({
            "collection": collection.display_name(),
            "fieldsets": fieldsets,
            "engine_query": engine_query,
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
    }

    Ok(())
}
