//! shopdb store - the e-commerce catalog model on top of shopdb core.
//!
//! [`shop_schema`] declares the catalog entities and their associations,
//! [`seed`] fills a bound database with a demo catalog, and [`config`] holds
//! the environment and command-line configuration of the `shopdb` binary.

pub mod config;
pub mod error;
pub mod models;
pub mod seed;

pub use config::{Args, Command, ConfigError, ShopConfig};
pub use error::Error;
pub use models::{shop_schema, ShopSchema};
pub use seed::{seed, SeedSummary};
