//! End-to-end tests of the run controller against mock executors.

mod common;
mod gate_tests;
mod idempotency_tests;
