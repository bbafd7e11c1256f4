//! End-to-end behavior of the catalog schema on a bound database.

use shopdb_core::catalog::{EntityDef, FieldDef, ScalarType, SchemaBuilder};
use shopdb_core::{
    ConfigurationError, Database, Decimal, Error, ReferentialIntegrityError, StorageConfig,
    ValidationError, Value,
};
use shopdb_store::models::{self, CATEGORY, DEFAULT_STOCK, PRODUCT, PRODUCT_TAG, TAG};
use shopdb_store::shop_schema;

fn shop_db() -> Database {
    Database::open(StorageConfig::temporary(), shop_schema().unwrap().schema).unwrap()
}

fn category(db: &Database, name: &str) -> i64 {
    db.insert(CATEGORY, [("category_name", Value::from(name))])
        .unwrap()
        .id
}

fn product(db: &Database, name: &str, category_id: Option<i64>) -> i64 {
    db.insert(
        PRODUCT,
        [
            ("product_name", Value::from(name)),
            ("price", Value::Decimal(Decimal::new(1999, 2))),
            ("category_id", Value::from(category_id)),
        ],
    )
    .unwrap()
    .id
}

fn tag(db: &Database, name: &str) -> i64 {
    db.insert(TAG, [("tag_name", Value::from(name))]).unwrap().id
}

fn link(db: &Database, product_id: i64, tag_id: i64) -> i64 {
    db.insert(
        PRODUCT_TAG,
        [
            ("product_id", Value::Int(product_id)),
            ("tag_id", Value::Int(tag_id)),
        ],
    )
    .unwrap()
    .id
}

fn ids(rows: &[shopdb_core::Row]) -> Vec<i64> {
    rows.iter().map(|r| r.id).collect()
}

#[test]
fn duplicate_field_is_rejected_at_definition() {
    let mut builder = SchemaBuilder::new();
    let result = builder.define_entity(
        models::category().with_field(FieldDef::new("category_name", ScalarType::String)),
    );

    assert!(matches!(
        result,
        Err(Error::Configuration(ConfigurationError::DuplicateField { field, .. }))
            if field == "category_name"
    ));
}

#[test]
fn redefinition_reuses_identical_and_rejects_conflicting() {
    let mut builder = SchemaBuilder::new();
    let first = builder.define_entity(models::tag()).unwrap();
    let again = builder.define_entity(models::tag()).unwrap();
    assert_eq!(first.id(), again.id());

    let changed = models::tag().with_field(FieldDef::optional("color", ScalarType::String));
    assert!(matches!(
        builder.define_entity(changed),
        Err(Error::Configuration(ConfigurationError::ConflictingRedefinition { .. }))
    ));
}

#[test]
fn non_numeric_price_fails_validation() {
    let db = shop_db();
    let result = db.insert(
        PRODUCT,
        [
            ("product_name", Value::from("Cargo Shorts")),
            ("price", Value::from("abc")),
        ],
    );

    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::Predicate { field, .. })) if field == "price"
    ));
    assert_eq!(db.count(PRODUCT).unwrap(), 0);
}

#[test]
fn malformed_price_literals_are_rejected() {
    let db = shop_db();
    for literal in ["1_000", "1.", "1__2.3_"] {
        let result = db.insert(
            PRODUCT,
            [
                ("product_name", Value::from("Cargo Shorts")),
                ("price", Value::from(literal)),
            ],
        );
        assert!(
            matches!(
                &result,
                Err(Error::Validation(ValidationError::Predicate { field, .. })) if field == "price"
            ),
            "{literal} was accepted: {result:?}"
        );
    }
    assert_eq!(db.count(PRODUCT).unwrap(), 0);
}

#[test]
fn stock_defaults_when_omitted() {
    let db = shop_db();
    let row = db
        .insert(
            PRODUCT,
            [
                ("product_name", Value::from("Plain T-Shirt")),
                ("price", Value::from("19.99")),
            ],
        )
        .unwrap();

    assert_eq!(row.get_i64("stock"), Some(DEFAULT_STOCK));
    assert_eq!(row.get_decimal("price"), Some(Decimal::new(1999, 2)));
    assert_eq!(row.get("category_id"), Some(&Value::Null));

    let stored = db.get(PRODUCT, row.id).unwrap().unwrap();
    assert_eq!(stored, row);
}

#[test]
fn missing_category_breaks_referential_integrity() {
    let db = shop_db();
    let result = db.insert(
        PRODUCT,
        [
            ("product_name", Value::from("Running Sneakers")),
            ("price", Value::from(90)),
            ("category_id", Value::Int(99)),
        ],
    );

    assert!(matches!(
        result,
        Err(Error::ReferentialIntegrity(ReferentialIntegrityError::MissingTarget {
            value: 99,
            ..
        }))
    ));
}

#[test]
fn join_row_with_missing_target_is_rejected() {
    let db = shop_db();
    let p1 = product(&db, "Plain T-Shirt", None);
    let t1 = tag(&db, "white");

    for (product_id, tag_id, missing) in [(99, t1, PRODUCT), (p1, 42, TAG)] {
        let result = db.insert(
            PRODUCT_TAG,
            [
                ("product_id", Value::Int(product_id)),
                ("tag_id", Value::Int(tag_id)),
            ],
        );
        assert!(matches!(
            result,
            Err(Error::ReferentialIntegrity(ReferentialIntegrityError::MissingTarget {
                target_entity,
                ..
            })) if target_entity == missing
        ));
    }
    assert_eq!(db.count(PRODUCT_TAG).unwrap(), 0);
}

#[test]
fn product_tags_resolve_through_join_rows() {
    let db = shop_db();
    let p1 = product(&db, "Branded Baseball Hat", None);
    let p2 = product(&db, "Cargo Shorts", None);
    let t1 = tag(&db, "blue");
    let t2 = tag(&db, "red");
    let t3 = tag(&db, "green");
    link(&db, p1, t2);
    link(&db, p1, t1);
    link(&db, p2, t3);

    assert_eq!(ids(&db.many_to_many(PRODUCT, p1, "tags").unwrap()), vec![t1, t2]);
    assert_eq!(ids(&db.many_to_many(TAG, t3, "products").unwrap()), vec![p2]);
    assert!(db.many_to_many(TAG, t1, "products").unwrap().iter().all(|p| p.id == p1));
}

#[test]
fn batched_tags_match_per_product_lookup() {
    let db = shop_db();
    let p1 = product(&db, "Plain T-Shirt", None);
    let p2 = product(&db, "Cargo Shorts", None);
    let p3 = product(&db, "Untagged", None);
    let t1 = tag(&db, "white");
    let t2 = tag(&db, "gold");
    link(&db, p1, t2);
    link(&db, p2, t1);
    link(&db, p1, t1);
    link(&db, p1, t2);

    let products = db.all(PRODUCT).unwrap();
    let grouped = db.related_for_all(PRODUCT, &products, "tags").unwrap();

    assert_eq!(grouped.len(), 3);
    assert_eq!(ids(&grouped[&p1]), vec![t1, t2]);
    assert_eq!(ids(&grouped[&p2]), vec![t1]);
    assert!(grouped[&p3].is_empty());
    for product in &products {
        let single = db.many_to_many(PRODUCT, product.id, "tags").unwrap();
        assert_eq!(grouped[&product.id], single);
    }

    let only_second = db.related_for_all(PRODUCT, &products[1..2], "tags").unwrap();
    assert_eq!(only_second.keys().copied().collect::<Vec<_>>(), vec![p2]);
}

#[test]
fn category_products_skip_null_keys() {
    let db = shop_db();
    let shirts = category(&db, "Shirts");
    let hats = category(&db, "Hats");
    let a = product(&db, "Plain T-Shirt", Some(shirts));
    let b = product(&db, "Polo Shirt", Some(shirts));
    product(&db, "Loose Item", None);
    product(&db, "Baseball Hat", Some(hats));
    let c = product(&db, "Tank Top", Some(shirts));

    assert_eq!(ids(&db.has_many(CATEGORY, shirts, "products").unwrap()), vec![a, b, c]);

    let owner = db.belongs_to(PRODUCT, a, "category").unwrap().unwrap();
    assert_eq!(owner.get_str("category_name"), Some("Shirts"));
}

#[test]
fn deleting_category_nulls_product_keys() {
    let db = shop_db();
    let music = category(&db, "Music");
    let vinyl = product(&db, "Vinyl Record", Some(music));

    let result = db.delete(CATEGORY, music).unwrap();

    assert_eq!(result.deleted, vec![(CATEGORY.to_string(), music)]);
    assert_eq!(
        result.nullified,
        vec![(PRODUCT.to_string(), vinyl, "category_id".to_string())]
    );
    let stored = db.get(PRODUCT, vinyl).unwrap().unwrap();
    assert_eq!(stored.get("category_id"), Some(&Value::Null));
    assert!(db.belongs_to(PRODUCT, vinyl, "category").unwrap().is_none());
}

#[test]
fn deleting_product_removes_join_rows() {
    let db = shop_db();
    let p1 = product(&db, "Plain T-Shirt", None);
    let p2 = product(&db, "Cargo Shorts", None);
    let t1 = tag(&db, "white");
    let kept = link(&db, p2, t1);
    link(&db, p1, t1);

    let result = db.delete(PRODUCT, p1).unwrap();

    assert_eq!(result.deleted[0], (PRODUCT.to_string(), p1));
    assert_eq!(result.deleted_count(PRODUCT_TAG), 1);
    assert_eq!(ids(&db.all(PRODUCT_TAG).unwrap()), vec![kept]);
    assert_eq!(ids(&db.many_to_many(TAG, t1, "products").unwrap()), vec![p2]);
    assert!(db.get(TAG, t1).unwrap().is_some());
}

#[test]
fn restrict_refuses_delete_while_referenced() {
    let mut builder = SchemaBuilder::new();
    let supplier = builder
        .define_entity(
            EntityDef::new("supplier")
                .with_field(FieldDef::surrogate_key("id"))
                .with_field(FieldDef::new("supplier_name", ScalarType::String)),
        )
        .unwrap();
    let shipment = builder
        .define_entity(
            EntityDef::new("shipment")
                .with_field(FieldDef::surrogate_key("id"))
                .with_field(FieldDef::new("supplier_id", ScalarType::Integer).references("supplier", "id")),
        )
        .unwrap();
    builder.declare_one_to_many(&supplier, &shipment, "supplier_id").unwrap();
    let db = Database::open(StorageConfig::temporary(), builder.build().unwrap()).unwrap();

    let acme = db
        .insert("supplier", [("supplier_name", Value::from("Acme"))])
        .unwrap()
        .id;
    let shipment_id = db
        .insert("shipment", [("supplier_id", Value::Int(acme))])
        .unwrap()
        .id;

    assert!(matches!(
        db.delete("supplier", acme),
        Err(Error::ReferentialIntegrity(ReferentialIntegrityError::RestrictViolation {
            count: 1,
            ..
        }))
    ));
    assert!(db.get("supplier", acme).unwrap().is_some());

    db.delete("shipment", shipment_id).unwrap();
    db.delete("supplier", acme).unwrap();
    assert_eq!(db.count("supplier").unwrap(), 0);
}

#[test]
fn rebinding_same_schema_keeps_catalog_version() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::new(dir.path().join("ecommerce_db"));

    let product_id = {
        let db = Database::open(config.clone(), shop_schema().unwrap().schema).unwrap();
        assert_eq!(db.schema_version(), 1);
        let id = product(&db, "Plain T-Shirt", None);
        db.flush().unwrap();
        id
    };

    let db = Database::open(config, shop_schema().unwrap().schema).unwrap();
    assert_eq!(db.schema_version(), 1);
    assert_eq!(db.catalog().list_versions().unwrap(), vec![1]);
    assert!(db.get(PRODUCT, product_id).unwrap().is_some());

    let next = product(&db, "Cargo Shorts", None);
    assert!(next > product_id);
}
