//! Constraint enforcement module.
//!
//! This module enforces the declared rules at write time:
//! - Field rules (nullability, defaults, validators, type coercion)
//! - Foreign key existence
//! - Delete behaviors (cascade, restrict, set null)

mod cascade;
mod integrity;
mod validator;

pub use cascade::{CascadeExecutor, CascadeResult, MAX_CASCADE_DEPTH};
pub use integrity::ReferenceValidator;
pub use validator::{coerce, FieldValidator};
