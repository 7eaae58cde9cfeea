//! Canonicalization routine for package metadata
//!
//! [`Canonicalizer`] is the boundary the normalizer calls into: given a record
//! it either reshapes it into canonical form in place or fails. The built-in
//! [`PackageDataCanonicalizer`] follows the conventions of npm's
//! `normalize-package-data`: it coerces what it can and rejects records whose
//! structural fields cannot be coerced (unparsable repository URLs, invalid
//! versions, invalid names).

use super::hosted_git::HostedGitInfo;
use super::PackageJson;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use thiserror::Error;
use url::Url;

/// Readme placeholder used when a package ships none
pub const MISSING_README: &str = "ERROR: No README data found!";

const DEPENDENCY_FIELDS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "optionalDependencies",
    "peerDependencies",
];

static LOOSE_SEMVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[v=\s]*([0-9]+)\.([0-9]+)\.([0-9]+)(?:-?((?:[0-9]+|[0-9]*[a-zA-Z-][a-zA-Z0-9-]*)(?:\.(?:[0-9]+|[0-9]*[a-zA-Z-][a-zA-Z0-9-]*))*))?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$",
    )
    .expect("valid semver pattern")
});

static KEYWORD_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\s]+").expect("valid keyword separator pattern"));

/// Canonicalization failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CanonicalizeError {
    #[error("name field must be a string")]
    NameNotString,

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("version field must be a string")]
    VersionNotString,

    #[error("Invalid version: {0:?}")]
    InvalidVersion(String),

    #[error("repository field must be a string or an object")]
    InvalidRepository,

    #[error("repository.url must be a string")]
    RepositoryUrlNotString,

    #[error("Malformed repository URL {url:?}: {reason}")]
    MalformedRepositoryUrl { url: String, reason: String },
}

impl CanonicalizeError {
    /// The package.json field the failure is about
    pub fn field(&self) -> &'static str {
        match self {
            CanonicalizeError::NameNotString | CanonicalizeError::InvalidName(_) => "name",
            CanonicalizeError::VersionNotString | CanonicalizeError::InvalidVersion(_) => "version",
            CanonicalizeError::InvalidRepository => "repository",
            CanonicalizeError::RepositoryUrlNotString
            | CanonicalizeError::MalformedRepositoryUrl { .. } => "repository.url",
        }
    }
}

/// Reshapes a record into canonical form in place
pub trait Canonicalizer: Send + Sync {
    fn canonicalize(&self, package_json: &mut PackageJson) -> Result<(), CanonicalizeError>;
}

/// Built-in canonicalizer modelled on `normalize-package-data`
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageDataCanonicalizer;

impl Canonicalizer for PackageDataCanonicalizer {
    fn canonicalize(&self, pj: &mut PackageJson) -> Result<(), CanonicalizeError> {
        fix_name(pj)?;
        fix_version(pj)?;
        fix_description(pj);
        let hosted = fix_repository(pj)?;
        fix_scripts(pj);
        fix_files(pj);
        fix_bugs(pj, hosted.as_ref());
        fix_keywords(pj);
        fix_readme(pj);
        fix_homepage(pj, hosted.as_ref());
        for field in DEPENDENCY_FIELDS {
            fix_dependencies(pj, field);
        }

        if let (Some(Value::String(name)), Some(Value::String(version))) =
            (pj.get("name"), pj.get("version"))
        {
            let id = format!("{}@{}", name, version);
            pj.insert("_id".to_string(), Value::String(id));
        }

        Ok(())
    }
}

fn fix_name(pj: &mut PackageJson) -> Result<(), CanonicalizeError> {
    match pj.get_mut("name") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(name)) => {
            let trimmed = name.trim();
            if !is_valid_name(trimmed) {
                return Err(CanonicalizeError::InvalidName(name.clone()));
            }
            if trimmed.len() != name.len() {
                *name = trimmed.to_string();
            }
            Ok(())
        }
        Some(_) => Err(CanonicalizeError::NameNotString),
    }
}

fn is_valid_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if name.is_empty() || name.starts_with('.') || lower == "node_modules" || lower == "favicon.ico" {
        return false;
    }

    match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, pkg)) => is_url_safe(scope) && is_url_safe(pkg),
            None => false,
        },
        None => is_url_safe(name),
    }
}

/// Characters `encodeURIComponent` leaves untouched
fn is_url_safe(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.!~*'()".contains(c))
}

fn fix_version(pj: &mut PackageJson) -> Result<(), CanonicalizeError> {
    match pj.get_mut("version") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(version)) => {
            let cleaned = clean_version(version)
                .ok_or_else(|| CanonicalizeError::InvalidVersion(version.clone()))?;
            *version = cleaned;
            Ok(())
        }
        Some(_) => Err(CanonicalizeError::VersionNotString),
    }
}

/// Loose semver parse, returning `major.minor.patch[-prerelease]`
pub(crate) fn clean_version(version: &str) -> Option<String> {
    let caps = LOOSE_SEMVER.captures(version.trim())?;
    let major: u64 = caps[1].parse().ok()?;
    let minor: u64 = caps[2].parse().ok()?;
    let patch: u64 = caps[3].parse().ok()?;

    Some(match caps.get(4) {
        Some(pre) => format!("{}.{}.{}-{}", major, minor, patch, pre.as_str()),
        None => format!("{}.{}.{}", major, minor, patch),
    })
}

fn fix_description(pj: &mut PackageJson) {
    match pj.get("description") {
        Some(Value::String(_)) => {}
        Some(_) => {
            pj.remove("description");
        }
        None => {
            let description = pj
                .get("readme")
                .and_then(Value::as_str)
                .and_then(extract_description);
            if let Some(description) = description {
                pj.insert("description".to_string(), Value::String(description));
            }
        }
    }
}

/// First paragraph of a readme that is not a heading
fn extract_description(readme: &str) -> Option<String> {
    if readme == MISSING_README {
        return None;
    }

    let lines: Vec<&str> = readme.trim().lines().collect();
    let start = lines
        .iter()
        .position(|l| !(l.trim().is_empty() || l.trim().starts_with('#')))?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.trim().is_empty())
        .map(|i| start + 1 + i)
        .unwrap_or(lines.len());

    let description = lines[start..end].join(" ").trim().to_string();
    (!description.is_empty()).then_some(description)
}

fn fix_repository(pj: &mut PackageJson) -> Result<Option<HostedGitInfo>, CanonicalizeError> {
    match pj.get("repository") {
        None => return Ok(None),
        Some(Value::Null) => {
            pj.remove("repository");
            return Ok(None);
        }
        Some(Value::String(url)) => {
            let repository = json!({ "type": "git", "url": url });
            pj.insert("repository".to_string(), repository);
        }
        Some(Value::Object(_)) => {}
        Some(_) => return Err(CanonicalizeError::InvalidRepository),
    }

    let Some(Value::Object(repository)) = pj.get_mut("repository") else {
        return Ok(None);
    };

    let url = match repository.get_mut("url") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(url)) => url,
        Some(_) => return Err(CanonicalizeError::RepositoryUrlNotString),
    };

    validate_repository_url(url)?;

    let hosted = HostedGitInfo::from_url(url);
    if let Some(info) = &hosted {
        *url = info.to_url();
    }

    Ok(hosted)
}

fn validate_repository_url(url: &str) -> Result<(), CanonicalizeError> {
    let malformed = |reason: &str| CanonicalizeError::MalformedRepositoryUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if !has_valid_percent_escapes(url) {
        return Err(malformed("invalid percent-encoding"));
    }

    if url.contains("://") {
        Url::parse(url).map_err(|e| malformed(&e.to_string()))?;
    }

    Ok(())
}

/// Every `%` must start an escape that decodes to valid UTF-8
fn has_valid_percent_escapes(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            // Both digits must be hex; `from_str_radix` alone accepts a sign
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| std::str::from_utf8(h).ok());
            match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                Some(byte) => decoded.push(byte),
                None => return false,
            }
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).is_ok()
}

fn fix_scripts(pj: &mut PackageJson) {
    match pj.get_mut("scripts") {
        None | Some(Value::Object(_)) => {}
        Some(_) => {
            pj.remove("scripts");
            return;
        }
    }
    if let Some(Value::Object(scripts)) = pj.get_mut("scripts") {
        scripts.retain(|_, v| v.is_string());
    }
}

fn fix_files(pj: &mut PackageJson) {
    match pj.get_mut("files") {
        None => {}
        Some(Value::Array(files)) => files.retain(Value::is_string),
        Some(_) => {
            pj.remove("files");
        }
    }
}

fn fix_bugs(pj: &mut PackageJson, hosted: Option<&HostedGitInfo>) {
    match pj.get("bugs") {
        None | Some(Value::Null) => {
            pj.remove("bugs");
            if let Some(info) = hosted {
                pj.insert("bugs".to_string(), json!({ "url": info.bugs_url() }));
            }
        }
        Some(Value::String(bugs)) => {
            let bugs = if bugs.contains('@') && !bugs.contains("://") {
                json!({ "email": bugs })
            } else {
                json!({ "url": bugs })
            };
            pj.insert("bugs".to_string(), bugs);
        }
        Some(Value::Object(_)) => {}
        Some(_) => {
            pj.remove("bugs");
        }
    }
}

fn fix_keywords(pj: &mut PackageJson) {
    let keywords: Vec<Value> = match pj.get("keywords") {
        None => return,
        Some(Value::String(s)) => KEYWORD_SEPARATOR
            .split(s)
            .filter(|k| !k.is_empty())
            .map(|k| Value::String(k.to_string()))
            .collect(),
        Some(Value::Array(items)) => items.iter().filter(|v| v.is_string()).cloned().collect(),
        Some(_) => {
            pj.remove("keywords");
            return;
        }
    };
    pj.insert("keywords".to_string(), Value::Array(keywords));
}

fn fix_readme(pj: &mut PackageJson) {
    if !matches!(pj.get("readme"), Some(Value::String(_))) {
        pj.insert("readme".to_string(), Value::String(MISSING_README.to_string()));
    }
}

fn fix_homepage(pj: &mut PackageJson, hosted: Option<&HostedGitInfo>) {
    match pj.get_mut("homepage") {
        Some(Value::String(homepage)) => {
            if !homepage.is_empty() && !homepage.contains("://") {
                *homepage = format!("http://{}", homepage);
            }
        }
        None | Some(Value::Null) => {
            pj.remove("homepage");
            if let Some(info) = hosted {
                pj.insert("homepage".to_string(), Value::String(info.docs_url()));
            }
        }
        Some(_) => {
            pj.remove("homepage");
        }
    }
}

fn fix_dependencies(pj: &mut PackageJson, field: &str) {
    let deps = match pj.get(field) {
        None => return,
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .map(|name| (name.trim().to_string(), Value::String("*".to_string())))
            .filter(|(name, _)| !name.is_empty())
            .collect::<Map<_, _>>(),
        Some(Value::Object(deps)) => deps
            .iter()
            .filter(|(_, range)| range.is_string())
            .map(|(name, range)| (name.clone(), range.clone()))
            .collect(),
        Some(_) => {
            pj.remove(field);
            return;
        }
    };
    pj.insert(field.to_string(), Value::Object(deps));
}
