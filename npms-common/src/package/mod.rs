//! Package metadata model and normalization
//!
//! Upstream `package.json` documents are frequently malformed, incomplete or
//! internally inconsistent. [`normalize_package_json`] turns one raw record into
//! a canonical record or a classified [`NormalizeError`].

pub mod canonical;
pub mod hosted_git;
pub mod normalize;

pub use canonical::{CanonicalizeError, Canonicalizer, PackageDataCanonicalizer};
pub use hosted_git::{normalize_trailing_slashes, GitHost, HostedGitInfo};
pub use normalize::{
    normalize_package_json, normalize_package_json_with, NormalizeError, NormalizeOptions,
    PLACEHOLDER_VERSION,
};

/// A raw or canonical `package.json` record
pub type PackageJson = serde_json::Map<String, serde_json::Value>;
