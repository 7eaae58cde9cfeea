//! # npms Common Library
//!
//! Shared code for the npms maintenance tasks including:
//! - Error types
//! - Configuration loading and resolution
//! - Tracing initialization
//! - Package metadata model and normalization

pub mod config;
pub mod error;
pub mod logging;
pub mod package;

pub use error::{Error, Result};
pub use package::{normalize_package_json, NormalizeError, NormalizeOptions, PackageJson};
