//! Test utilities for the RESTful API load test.
//!
//! This crate provides an in-process mock of the objects API and a test logger. See the modules
//! for all available utilities.

pub mod server;
pub mod tracing;
