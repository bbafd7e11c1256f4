//! Catalog entities and their associations.
//!
//! - `category` has many `product` through `product.category_id`; deleting a
//!   category sets that key to null on its products.
//! - `product` and `tag` relate many-to-many through `product_tag`; join rows
//!   are deleted with either side.

use shopdb_core::catalog::{
    DefaultValue, DeleteBehavior, EntityDef, EntityHandle, FieldDef, ScalarType, Schema,
    SchemaBuilder, Validator,
};
use shopdb_core::Error;

/// Logical name of the category entity.
pub const CATEGORY: &str = "category";
/// Logical name of the product entity.
pub const PRODUCT: &str = "product";
/// Logical name of the tag entity.
pub const TAG: &str = "tag";
/// Logical name of the product/tag join entity.
pub const PRODUCT_TAG: &str = "product_tag";

/// Stock assigned to products written without one.
pub const DEFAULT_STOCK: i64 = 10;

/// The frozen catalog schema with handles to its entities.
#[derive(Debug, Clone)]
pub struct ShopSchema {
    /// Frozen schema, ready to bind.
    pub schema: Schema,
    /// Category entity.
    pub category: EntityHandle,
    /// Product entity.
    pub product: EntityHandle,
    /// Tag entity.
    pub tag: EntityHandle,
    /// Product/tag join entity.
    pub product_tag: EntityHandle,
}

/// `category`: a required name.
pub fn category() -> EntityDef {
    EntityDef::new(CATEGORY)
        .with_field(FieldDef::surrogate_key("id"))
        .with_field(FieldDef::new("category_name", ScalarType::String))
}

/// `product`: name, decimal price, stock (default [`DEFAULT_STOCK`]) and an
/// optional category.
pub fn product() -> EntityDef {
    EntityDef::new(PRODUCT)
        .with_field(FieldDef::surrogate_key("id"))
        .with_field(FieldDef::new("product_name", ScalarType::String))
        .with_field(FieldDef::new("price", ScalarType::Decimal).with_validator(Validator::IsDecimal))
        .with_field(
            FieldDef::new("stock", ScalarType::Integer)
                .with_default(DefaultValue::Int(DEFAULT_STOCK))
                .with_validator(Validator::IsNumeric),
        )
        .with_field(FieldDef::optional("category_id", ScalarType::Integer).references(CATEGORY, "id"))
}

/// `tag`: an optional name.
pub fn tag() -> EntityDef {
    EntityDef::new(TAG)
        .with_field(FieldDef::surrogate_key("id"))
        .with_field(FieldDef::optional("tag_name", ScalarType::String))
}

/// `product_tag`: one product/tag pairing.
pub fn product_tag() -> EntityDef {
    EntityDef::new(PRODUCT_TAG)
        .with_field(FieldDef::surrogate_key("id"))
        .with_field(FieldDef::optional("product_id", ScalarType::Integer).references(PRODUCT, "id"))
        .with_field(FieldDef::optional("tag_id", ScalarType::Integer).references(TAG, "id"))
}

/// Declare the catalog on a builder and return the handles.
pub fn declare(
    builder: &mut SchemaBuilder,
) -> Result<(EntityHandle, EntityHandle, EntityHandle, EntityHandle), Error> {
    let category = builder.define_entity(category())?;
    let product = builder.define_entity(product())?;
    let tag = builder.define_entity(tag())?;
    let product_tag = builder.define_entity(product_tag())?;

    builder.declare_one_to_many_with(&category, &product, "category_id", DeleteBehavior::SetNull)?;
    builder.declare_belongs_to(&product, &category, "category_id")?;
    builder.declare_many_to_many(&product, &tag, &product_tag, "product_id", "tag_id")?;
    // Same relation seen from the tag side; returns the one declared above.
    builder.declare_many_to_many(&tag, &product, &product_tag, "tag_id", "product_id")?;

    Ok((category, product, tag, product_tag))
}

/// Build the catalog schema.
pub fn shop_schema() -> Result<ShopSchema, Error> {
    let mut builder = SchemaBuilder::new();
    let (category, product, tag, product_tag) = declare(&mut builder)?;

    Ok(ShopSchema {
        schema: builder.build()?,
        category,
        product,
        tag,
        product_tag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopdb_core::catalog::AccessorKind;

    #[test]
    fn test_tables_follow_logical_names() {
        let shop = shop_schema().unwrap();

        assert_eq!(shop.category.table(), "category");
        assert_eq!(shop.product_tag.table(), "product_tag");
        assert_eq!(shop.schema.entity_names(), vec![CATEGORY, PRODUCT, TAG, PRODUCT_TAG]);
    }

    #[test]
    fn test_accessors() {
        let shop = shop_schema().unwrap();
        let schema = &shop.schema;

        let products = schema.accessor(shop.category.id(), "products").unwrap();
        assert_eq!(products.kind, AccessorKind::HasMany);

        let owner = schema.accessor(shop.product.id(), "category").unwrap();
        assert_eq!(owner.kind, AccessorKind::BelongsTo);

        let tags = schema.accessor(shop.product.id(), "tags").unwrap();
        assert_eq!(tags.kind, AccessorKind::BelongsToMany);
        assert_eq!(tags.target, shop.tag.id());

        let tagged = schema.accessor(shop.tag.id(), "products").unwrap();
        assert_eq!(tagged.target, shop.product.id());
    }

    #[test]
    fn test_delete_behaviors() {
        let shop = shop_schema().unwrap();
        let schema = &shop.schema;

        let on_category: Vec<_> = schema.referencing(shop.category.id()).collect();
        assert_eq!(on_category.len(), 1);
        assert_eq!(on_category[0].on_delete, DeleteBehavior::SetNull);

        assert!(schema
            .referencing(shop.product.id())
            .chain(schema.referencing(shop.tag.id()))
            .all(|fk| fk.on_delete == DeleteBehavior::Cascade));
        assert_eq!(schema.relations().len(), 2);
    }
}
