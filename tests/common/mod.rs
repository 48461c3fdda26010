//! Common test utilities and fixtures for the memcache-manager test suite.
//!
//! Shared passwords, payloads, deterministic IV sources and data generators used by
//! the integration and property-based tests.

pub mod fixtures;
