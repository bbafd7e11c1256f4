//! Row encoding and relation loading.

mod loader;
mod row;
mod value_codec;

pub(crate) use loader::decode_row;
pub use loader::RelationLoader;
pub use row::Row;
pub use value_codec::{decode_entity, encode_entity, get_field};
