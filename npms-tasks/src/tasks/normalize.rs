//! normalize task
//!
//! Reads a raw package.json from disk and runs it through the same
//! normalization the analyzer applies before analysis.

use crate::error::TaskError;
use npms_common::package::{normalize_package_json, NormalizeOptions, PackageJson};
use std::path::Path;

pub fn run(name: &str, path: &Path, options: NormalizeOptions) -> Result<PackageJson, TaskError> {
    let content = std::fs::read_to_string(path)?;
    let package_json: PackageJson = serde_json::from_str(&content)?;

    Ok(normalize_package_json(name, package_json, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_normalizes_file() {
        let file = write_temp(r#"{ "name": "bar-pkg", "version": "2.0.0" }"#);
        let pj = run("foo", file.path(), NormalizeOptions::default()).unwrap();
        assert_eq!(pj["name"], "foo");
        assert_eq!(pj["version"], "2.0.0");
    }

    #[test]
    fn test_invalid_json() {
        let file = write_temp("{ not json");
        let err = run("foo", file.path(), NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, TaskError::Json(_)));
    }

    #[test]
    fn test_unrecoverable_failure_maps_to_exit_code() {
        let file = write_temp(r#"{ "version": "1.0.0", "repository": { "url": "https://github.com/%zz/x" } }"#);
        let err = run("foo", file.path(), NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, TaskError::Normalize(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_missing_file() {
        let err = run("foo", Path::new("/nonexistent/package.json"), NormalizeOptions::default())
            .unwrap_err();
        assert!(matches!(err, TaskError::Io(_)));
    }
}
