//! Demo catalog.

use shopdb_core::{Database, Decimal, Value};
use tracing::info;

use crate::error::Error;
use crate::models::{CATEGORY, PRODUCT, PRODUCT_TAG, TAG};

const CATEGORIES: &[&str] = &["Shirts", "Shorts", "Music", "Hats", "Shoes"];

/// (name, price in cents, stock, category index)
const PRODUCTS: &[(&str, i64, i64, usize)] = &[
    ("Plain T-Shirt", 1499, 14, 0),
    ("Running Sneakers", 9000, 25, 4),
    ("Branded Baseball Hat", 2299, 12, 3),
    ("Top 40 Music Compilation Vinyl Record", 1299, 50, 2),
    ("Cargo Shorts", 2999, 22, 1),
];

const TAGS: &[&str] = &[
    "rock music",
    "pop music",
    "blue",
    "red",
    "green",
    "white",
    "gold",
    "pop culture",
];

/// (product index, tag index)
const PRODUCT_TAGS: &[(usize, usize)] = &[
    (0, 5),
    (0, 6),
    (0, 7),
    (1, 5),
    (2, 0),
    (2, 2),
    (2, 3),
    (2, 4),
    (3, 0),
    (3, 1),
    (3, 7),
    (4, 2),
];

/// Rows written by [`seed`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    /// Categories inserted.
    pub categories: usize,
    /// Products inserted.
    pub products: usize,
    /// Tags inserted.
    pub tags: usize,
    /// Product/tag pairings inserted.
    pub product_tags: usize,
    /// The database already held categories; nothing was written.
    pub skipped: bool,
}

/// Insert the demo catalog unless the database already has categories.
pub fn seed(db: &Database) -> Result<SeedSummary, Error> {
    if db.count(CATEGORY)? > 0 {
        info!("catalog already populated, skipping seed");
        return Ok(SeedSummary {
            skipped: true,
            ..SeedSummary::default()
        });
    }

    let mut category_ids = Vec::with_capacity(CATEGORIES.len());
    for name in CATEGORIES {
        let row = db.insert(CATEGORY, [("category_name", Value::from(*name))])?;
        category_ids.push(row.id);
    }

    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for &(name, cents, stock, category) in PRODUCTS {
        let row = db.insert(
            PRODUCT,
            [
                ("product_name", Value::from(name)),
                ("price", Value::Decimal(Decimal::new(cents, 2))),
                ("stock", Value::Int(stock)),
                ("category_id", Value::Int(category_ids[category])),
            ],
        )?;
        product_ids.push(row.id);
    }

    let mut tag_ids = Vec::with_capacity(TAGS.len());
    for name in TAGS {
        let row = db.insert(TAG, [("tag_name", Value::from(*name))])?;
        tag_ids.push(row.id);
    }

    for &(product, tag) in PRODUCT_TAGS {
        db.insert(
            PRODUCT_TAG,
            [
                ("product_id", Value::Int(product_ids[product])),
                ("tag_id", Value::Int(tag_ids[tag])),
            ],
        )?;
    }

    let summary = SeedSummary {
        categories: category_ids.len(),
        products: product_ids.len(),
        tags: tag_ids.len(),
        product_tags: PRODUCT_TAGS.len(),
        skipped: false,
    };
    info!(
        categories = summary.categories,
        products = summary.products,
        tags = summary.tags,
        product_tags = summary.product_tags,
        "catalog seeded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shop_schema;
    use shopdb_core::StorageConfig;

    fn shop_db() -> Database {
        Database::open(StorageConfig::temporary(), shop_schema().unwrap().schema).unwrap()
    }

    #[test]
    fn test_seed_counts() {
        let db = shop_db();
        let summary = seed(&db).unwrap();

        assert_eq!(summary.categories, 5);
        assert_eq!(summary.products, 5);
        assert_eq!(summary.tags, 8);
        assert_eq!(summary.product_tags, 12);
        assert_eq!(db.count(PRODUCT_TAG).unwrap(), 12);
    }

    #[test]
    fn test_seed_twice_skips() {
        let db = shop_db();
        seed(&db).unwrap();

        let again = seed(&db).unwrap();
        assert!(again.skipped);
        assert_eq!(db.count(CATEGORY).unwrap(), 5);
    }

    #[test]
    fn test_seeded_relations() {
        let db = shop_db();
        seed(&db).unwrap();

        let shirt = &db.find_by(PRODUCT, "product_name", "Plain T-Shirt").unwrap()[0];
        let tags: Vec<String> = db
            .many_to_many(PRODUCT, shirt.id, "tags")
            .unwrap()
            .iter()
            .filter_map(|t| t.get_str("tag_name").map(String::from))
            .collect();
        assert_eq!(tags, vec!["white", "gold", "pop culture"]);

        let category = db.belongs_to(PRODUCT, shirt.id, "category").unwrap().unwrap();
        assert_eq!(category.get_str("category_name"), Some("Shirts"));
    }
}
