//! shopdb - operator CLI for the catalog store.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopdb_core::Database;
use shopdb_store::models::PRODUCT;
use shopdb_store::{seed, shop_schema, Args, Command};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the process environment still applies.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopdb=info,shopdb_store=info,shopdb_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (config, command) = Args::parse().into_config()?;
    tracing::info!(
        db_name = %config.db_name,
        path = %config.storage_path().display(),
        cache_mb = config.cache_mb,
        "configuration loaded"
    );

    let shop = shop_schema().map_err(startup_failure)?;
    let database =
        Database::open(config.storage_config(), shop.schema).map_err(startup_failure)?;
    tracing::info!(
        schema_version = database.schema_version(),
        recovered = database.storage().was_recovered(),
        size_bytes = database.storage().size_on_disk()?,
        "database opened"
    );

    match command {
        Command::Describe => {
            println!("{}", serde_json::to_string_pretty(&database.schema().describe())?);
        }
        Command::Seed => {
            let summary = seed(&database)?;
            if summary.skipped {
                println!("catalog already populated");
            } else {
                println!(
                    "seeded {} categories, {} products, {} tags, {} product tags",
                    summary.categories, summary.products, summary.tags, summary.product_tags
                );
            }
        }
        Command::Products => {
            println!("{}", serde_json::to_string_pretty(&list_products(&database)?)?);
        }
    }

    database.flush()?;
    Ok(())
}

/// Log why the database could not be brought up and pass the error on.
fn startup_failure(error: shopdb_core::Error) -> shopdb_core::Error {
    if error.is_registration_error() {
        tracing::error!(%error, "catalog schema rejected");
    } else {
        tracing::error!(%error, "database open failed");
    }
    error
}

/// Products with their category and tags attached.
fn list_products(database: &Database) -> Result<serde_json::Value, shopdb_store::Error> {
    let products = database.all(PRODUCT)?;
    let mut categories = database.related_for_all(PRODUCT, &products, "category")?;
    let mut tags = database.related_for_all(PRODUCT, &products, "tags")?;

    let listed = products
        .iter()
        .map(|product| {
            let mut json = product.to_json();
            let category = categories
                .remove(&product.id)
                .and_then(|rows| rows.into_iter().next())
                .map(|row| row.to_json())
                .unwrap_or(serde_json::Value::Null);
            let product_tags: Vec<serde_json::Value> = tags
                .remove(&product.id)
                .unwrap_or_default()
                .iter()
                .map(|row| row.to_json())
                .collect();
            json["category"] = category;
            json["tags"] = serde_json::Value::Array(product_tags);
            json
        })
        .collect();
    Ok(serde_json::Value::Array(listed))
}
