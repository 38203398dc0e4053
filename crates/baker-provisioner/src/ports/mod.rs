//! # Ports Layer (Hexagonal Architecture)
//!
//! Outbound traits implemented by `adapters` in production and by
//! `testing` fakes in tests.

pub mod outbound;

pub use outbound::*;
