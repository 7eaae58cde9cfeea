//! Test Helper Utilities
//!
//! Shared utilities for testing npms-common

#![allow(dead_code)]

pub mod log_capture;
