//! Trait definitions for Scrivener.
//!
//! This crate provides the [`TextGenerator`] capability that every LLM backend
//! implements, together with the metadata types it reports.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;
mod types;

pub use traits::TextGenerator;
pub use types::{HealthStatus, ModelMetadata};
