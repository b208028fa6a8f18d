//! Catalog loader
//!
//! Loading pipeline for external catalog files:
//! 1. Size check against `SCAMDRILL_MAX_CATALOG_SIZE`
//! 2. YAML parsing into a [`CatalogDocument`]
//! 3. Validation (all issues collected)
//! 4. Freeze into an `Arc<Catalog>`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::config::validation::Validator;
use crate::content::{Catalog, ReflexChallenge, Scenario};
use crate::error::{ConfigError, ValidationIssue};

// ============================================================================
// Public API
// ============================================================================

/// Raw on-disk shape of a catalog file.
///
/// Either list may be omitted; validation decides whether the result is
/// usable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    /// Decision scenarios.
    #[serde(default)]
    pub scenarios: Vec<Scenario>,

    /// Reflex mini-game commands.
    #[serde(default)]
    pub reflex: Vec<ReflexChallenge>,
}

impl CatalogDocument {
    /// Appends the lists of `other` to this document.
    pub fn merge(&mut self, other: Self) {
        self.scenarios.extend(other.scenarios);
        self.reflex.extend(other.reflex);
    }
}

/// Options for the catalog loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Maximum catalog file size in bytes.
    pub max_catalog_size: usize,

    /// Treat validation warnings as errors.
    pub strict: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_catalog_size: env_or("SCAMDRILL_MAX_CATALOG_SIZE", 1024 * 1024),
            strict: false,
        }
    }
}

/// Result of loading a catalog.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated catalog.
    pub catalog: Arc<Catalog>,

    /// Warnings encountered during validation.
    pub warnings: Vec<ValidationIssue>,
}

/// Catalog loader.
#[derive(Debug, Default)]
pub struct CatalogLoader {
    options: LoaderOptions,
}

impl CatalogLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Loads and validates a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingFile` if the file cannot be read,
    /// `ConfigError::TooLarge` if it exceeds the size limit,
    /// `ConfigError::ParseError` on malformed YAML, and
    /// `ConfigError::ValidationError` if validation reports errors (or
    /// warnings in strict mode).
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let limit = self.options.max_catalog_size;
        if !usize::try_from(metadata.len()).is_ok_and(|size| size <= limit) {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_str(&raw, path)
    }

    /// Parses and validates catalog YAML that is already in memory.
    ///
    /// `origin` is only used for error messages.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file-system errors.
    pub fn load_str(&self, raw: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let doc = parse_document(raw, origin)?;
        self.build(doc, origin)
    }

    /// Validates a parsed document and freezes it into a catalog.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn build(&self, doc: CatalogDocument, origin: &Path) -> Result<LoadResult, ConfigError> {
        let result = Validator::new().validate(&doc);

        let mut errors = result.errors;
        let mut warnings = result.warnings;
        if self.options.strict {
            errors.append(&mut warnings);
        }
        if !errors.is_empty() {
            return Err(ConfigError::ValidationError {
                path: origin.display().to_string(),
                errors,
            });
        }

        for warning in &warnings {
            tracing::warn!(catalog = %origin.display(), path = %warning.path, "{}", warning.message);
        }

        let catalog = Catalog::new(doc.scenarios, doc.reflex)?;
        tracing::debug!(
            catalog = %origin.display(),
            scenarios = catalog.scenarios().len(),
            reflex = catalog.reflex().len(),
            "catalog loaded"
        );

        Ok(LoadResult {
            catalog: Arc::new(catalog),
            warnings,
        })
    }
}

/// Parses catalog YAML without validating it.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` if the YAML is malformed or has
/// unknown fields.
pub fn parse_document(raw: &str, origin: &Path) -> Result<CatalogDocument, ConfigError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
        path: PathBuf::from(origin),
        line: e.location().map(|l| l.line()),
        message: e.to_string(),
    })
}

/// Reads an environment variable and parses it, falling back to `default`.
pub(crate) fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SMALL: &str = r#"
scenarios:
  - id: sms-1
    category: sms
    title: Bank alert
    body: Your account is locked
    is_scam: true
    explanation: Fake domain
    difficulty: 2
reflex:
  - { command: "rm -rf malware", difficulty: 2 }
"#;

    fn loader() -> CatalogLoader {
        CatalogLoader::new(LoaderOptions {
            max_catalog_size: 64 * 1024,
            strict: false,
        })
    }

    #[test]
    fn test_load_str_valid() {
        let result = loader().load_str(SMALL, Path::new("small.yaml")).unwrap();
        assert_eq!(result.catalog.scenarios().len(), 1);
        assert_eq!(result.catalog.reflex()[0].command, "rm -rf malware");
        // difficulty coverage gap
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_strict_promotes_warnings() {
        let strict = CatalogLoader::new(LoaderOptions {
            max_catalog_size: 64 * 1024,
            strict: true,
        });
        let err = strict.load_str(SMALL, Path::new("small.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_parse_error_has_line() {
        let err = loader()
            .load_str("scenarios: [unterminated", Path::new("bad.yaml"))
            .unwrap_err();
        match err {
            ConfigError::ParseError { path, line, .. } => {
                assert_eq!(path, PathBuf::from("bad.yaml"));
                assert!(line.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = loader()
            .load_str("scenarios: []\nshop: []\n", Path::new("x.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_validation_errors_reported() {
        let err = loader()
            .load_str("reflex: []\n", Path::new("empty.yaml"))
            .unwrap_err();
        match err {
            ConfigError::ValidationError { path, errors } => {
                assert_eq!(path, "empty.yaml");
                assert_eq!(errors[0].path, "scenarios");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = loader()
            .load(Path::new("/definitely/not/here.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_load_file_too_large() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SMALL.as_bytes()).unwrap();
        let tiny = CatalogLoader::new(LoaderOptions {
            max_catalog_size: 10,
            strict: false,
        });
        let err = tiny.load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge { limit: 10, .. }));
    }

    #[test]
    fn test_load_file_with_bom() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "\u{feff}{SMALL}").unwrap();
        let result = loader().load(file.path()).unwrap();
        assert_eq!(result.catalog.default_scenario().id, "sms-1");
    }

    #[test]
    fn test_merge_documents() {
        let mut a = parse_document(SMALL, Path::new("a")).unwrap();
        let b = parse_document(SMALL, Path::new("b")).unwrap();
        a.merge(b);
        assert_eq!(a.scenarios.len(), 2);
        assert_eq!(a.reflex.len(), 2);
    }

    #[test]
    fn test_env_or_default() {
        assert_eq!(env_or("SCAMDRILL_TEST_UNSET_VARIABLE", 42_usize), 42);
    }
}
