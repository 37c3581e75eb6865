#![deny(unsafe_code)]

//! Shared test utilities for the berth workspace.
//!
//! Provides PEM fixtures, a startup options builder, recording fakes for
//! the daemon and command collaborators, and tracing helpers.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! berth-test-utils = { workspace = true }
//! ```

pub mod certs;
pub mod fakes;
pub mod startup;
pub mod tracing_setup;
