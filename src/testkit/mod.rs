//! Test doubles for code built on top of this crate.
//!
//! Enabled with the `testkit` feature. The crate's own integration tests
//! use these mocks; downstream crates can too.

pub mod executor;

pub use executor::ScriptedExecutor;
