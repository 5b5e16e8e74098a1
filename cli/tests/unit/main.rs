//! Unit tests for the tether CLI
//!
//! These tests use mocked dependencies and run fast without network I/O.

mod architecture;
mod mocks;
mod setup_service;
