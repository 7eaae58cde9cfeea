//! Metadata normalization pipeline
//!
//! Passes run in a fixed order and never loop back:
//! 1. Name consistency (optional): the caller-supplied name is the canonical identity
//! 2. Version presence: a missing version is mocked with [`PLACEHOLDER_VERSION`]
//! 3. Canonicalization: any failure here is unrecoverable for the record
//! 4. Repository URL repair: trailing slashes are normalized
//!
//! Passes 1, 2 and 4 are corrections, logged and applied silently. The record
//! is consumed; on failure it is only reachable through the error snapshot.

use super::canonical::{CanonicalizeError, Canonicalizer, PackageDataCanonicalizer};
use super::hosted_git::normalize_trailing_slashes;
use super::PackageJson;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Version assigned to records that ship without one
pub const PLACEHOLDER_VERSION: &str = "0.0.1";

/// Normalization options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Overwrite a missing or mismatching `name` with the caller-supplied name
    pub check_name: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { check_name: true }
    }
}

/// Classified normalization failure
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Transient failure; retrying the same record may succeed
    #[error("Recoverable normalization error: {cause}")]
    Recoverable {
        #[source]
        cause: CanonicalizeError,
    },

    /// The record cannot be normalized as-is and must not be retried
    #[error("Unrecoverable normalization error: {cause}")]
    Unrecoverable {
        #[source]
        cause: CanonicalizeError,
        /// Record as left by the failing pass, for diagnostics only
        snapshot: Box<PackageJson>,
    },
}

impl NormalizeError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NormalizeError::Recoverable { .. })
    }

    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, NormalizeError::Unrecoverable { .. })
    }

    pub fn cause(&self) -> &CanonicalizeError {
        match self {
            NormalizeError::Recoverable { cause } | NormalizeError::Unrecoverable { cause, .. } => {
                cause
            }
        }
    }

    pub fn snapshot(&self) -> Option<&PackageJson> {
        match self {
            NormalizeError::Recoverable { .. } => None,
            NormalizeError::Unrecoverable { snapshot, .. } => Some(&**snapshot),
        }
    }
}

/// Normalize a package.json with the built-in canonicalizer
pub fn normalize_package_json(
    name: &str,
    package_json: PackageJson,
    options: NormalizeOptions,
) -> Result<PackageJson, NormalizeError> {
    normalize_package_json_with(&PackageDataCanonicalizer, name, package_json, options)
}

/// Normalize a package.json with a custom canonicalization routine
pub fn normalize_package_json_with<C>(
    canonicalizer: &C,
    name: &str,
    mut package_json: PackageJson,
    options: NormalizeOptions,
) -> Result<PackageJson, NormalizeError>
where
    C: Canonicalizer + ?Sized,
{
    if options.check_name {
        check_name(name, &mut package_json);
    }

    // Some packages in the registry are corrupt and have no version at all
    if is_blank(package_json.get("version")) {
        warn!(
            package = %name,
            field = "version",
            placeholder = PLACEHOLDER_VERSION,
            "No version in package.json, mocking it"
        );
        package_json.insert("version".to_string(), Value::String(PLACEHOLDER_VERSION.to_string()));
    }

    // Fails on structurally malformed fields, e.g. unparsable URIs in repository.url
    if let Err(cause) = canonicalizer.canonicalize(&mut package_json) {
        warn!(
            package = %name,
            field = cause.field(),
            error = %cause,
            "Error normalizing package.json"
        );
        return Err(NormalizeError::Unrecoverable {
            cause,
            snapshot: Box::new(package_json),
        });
    }

    repair_repository_url(name, &mut package_json);

    Ok(package_json)
}

fn check_name(name: &str, package_json: &mut PackageJson) {
    match package_json.get("name") {
        found if is_blank(found) => {
            warn!(package = %name, field = "name", "No name in package.json, overwriting it");
        }
        Some(Value::String(found)) if found == name => return,
        Some(found) => {
            let found = match found {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            info!(
                package = %name,
                field = "name",
                package_json_name = %found,
                "Package name mismatch detected, overwriting it"
            );
        }
        None => {}
    }

    package_json.insert("name".to_string(), Value::String(name.to_string()));
}

fn repair_repository_url(name: &str, package_json: &mut PackageJson) {
    let Some(Value::Object(repository)) = package_json.get_mut("repository") else {
        return;
    };
    let Some(Value::String(url)) = repository.get_mut("url") else {
        return;
    };

    let normalized = normalize_trailing_slashes(url);
    if normalized != *url {
        info!(
            package = %name,
            field = "repository.url",
            from = %url,
            to = %normalized,
            "Normalized trailing slashes in repository url"
        );
        *url = normalized;
    }
}

/// Absent or falsy field
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}
