//! Cross-crate integration tests and test-signal helpers

pub mod signal;

#[cfg(test)]
mod chain_integration;
