//! CLI integration tests: `br scripts` against real configuration folders.

#![cfg(unix)]

mod build_tests;
mod common;
mod describe_tests;
