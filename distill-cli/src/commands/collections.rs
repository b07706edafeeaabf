use anyhow::{Context, Result};
use distill::schema::FieldLookup;
use distill::{CollectionRegistry, Config};

/// Print every registered collection
pub fn run_collections(config: &Config) -> Result<()> {
    let dir = &config.registry.collections_dir;
    let registry = CollectionRegistry::load_dir(dir)
        .with_context(|| format!("Failed to load collections from {:?}", dir))?;

    if registry.is_empty() {
        println!("No collections in {}", dir.display());
        return Ok(());
    }

    println!("{:<6} {:<40} {:<8} LOCATION", "ID", "NAME", "FIELDS");
    println!("--------------------------------------------------------------------------------");
    for collection in registry.all() {
        let fields = registry
            .declared_schema(collection.id)
            .map(|s| s.fields().len())
            .unwrap_or(0);
        let location = collection
            .location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<40} {:<8} {}",
            collection.id,
            collection.display_name(),
            fields,
            location
        );
    }
    println!();
    println!("{} collections", registry.len());

    Ok(())
}
