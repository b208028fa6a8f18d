//! Configuration: game rules and content catalog loading.

pub mod loader;
pub mod rules;
pub mod validation;

pub use loader::{CatalogDocument, CatalogLoader, LoadResult, LoaderOptions};
pub use rules::{GameRules, MAX_HP};
pub use validation::{ValidationResult, Validator};
