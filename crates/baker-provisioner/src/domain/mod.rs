//! # Domain Module
//!
//! Core types for node provisioning.

pub mod entities;
pub mod errors;
pub mod layout;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use value_objects::*;
