//! Testing utilities for the orchestration core.
//!
//! This module provides:
//! - A scriptable mock provider
//! - Request/config fixtures tuned for fast test loops

mod fixtures;
mod mocks;

pub use fixtures::{collecting_bus, fast_config, request_for, sample_request};
pub use mocks::MockProvider;
