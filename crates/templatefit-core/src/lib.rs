//! Core types shared by the templatefit crates
//!
//! This crate holds the unified [`Error`] type used by the histogram and tensor
//! crates, and the one-decimal bin labels ([`Decimal1`]) from which process and
//! group identifiers are built.

pub mod error;
pub mod labels;

// Re-export core types
pub use error::{Error, Result};
pub use labels::{float_label, Decimal1};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
