//! Built-in content catalogs
//!
//! Scenario and reflex catalogs embedded in the binary at compile time, so
//! `scamdrill play` works without any external files.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::config::loader::{CatalogLoader, LoaderOptions, parse_document};
use crate::content::Catalog;
use crate::error::ConfigError;

/// Origin label used in errors and logs for the embedded catalog.
pub const BUILTIN_ORIGIN: &str = "<builtin>";

const SCENARIOS_YAML: &str = include_str!("../../catalog/scenarios.yaml");
const REFLEX_YAML: &str = include_str!("../../catalog/reflex.yaml");

/// Parsed once on first use; the error is kept as text because
/// `ConfigError` is not `Clone`.
static BUILTIN_CATALOG: LazyLock<Result<Arc<Catalog>, String>> = LazyLock::new(|| {
    let origin = Path::new(BUILTIN_ORIGIN);
    let mut doc = parse_document(SCENARIOS_YAML, origin).map_err(|e| e.to_string())?;
    doc.merge(parse_document(REFLEX_YAML, origin).map_err(|e| e.to_string())?);
    CatalogLoader::new(LoaderOptions::default())
        .build(doc, origin)
        .map(|loaded| loaded.catalog)
        .map_err(|e| e.to_string())
});

/// Returns the embedded catalog.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` if the embedded YAML is broken, which
/// the test suite guards against.
pub fn builtin_catalog() -> Result<Arc<Catalog>, ConfigError> {
    BUILTIN_CATALOG
        .as_ref()
        .map(Arc::clone)
        .map_err(|message| ConfigError::ParseError {
            path: BUILTIN_ORIGIN.into(),
            line: None,
            message: message.clone(),
        })
}
