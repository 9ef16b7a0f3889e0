//! Shared utilities.
//!
//! File hashing (used to detect `flake.lock` changes), filesystem helpers and
//! test fixtures.

pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
