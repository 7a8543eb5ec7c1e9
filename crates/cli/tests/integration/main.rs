//! CLI integration tests for devup.

mod common;
mod run_tests;
