//! Library integration tests: whole builds against real configuration folders.

#![cfg(unix)]

mod common;
mod fingerprint_tests;
mod scripts_tests;
