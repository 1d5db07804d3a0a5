//! Common types shared by the Elasticsearch module test harness.

#![warn(clippy::pedantic)]

/// Module for harness configuration loaded from the environment
pub mod config;

/// Module for credential types that prevent accidental logging
pub mod secret;

/// Module for AWS resource types shared across fixtures
pub mod types;
