//! CLI integration tests for kiln.

mod common;

mod build_tests;
mod clean_tests;
mod plan_tests;
