//! # agentflux core
//!
//! Domain types shared by every agentflux crate: the reconstructed
//! [`ToolInvocation`], the provider-side stream shapes the response handlers
//! consume, and the error taxonomy.
//!
//! This crate has no runtime dependencies beyond serde and thiserror, so the
//! streaming engine, the configuration layer and the CLI all depend inward
//! on it.

pub mod error;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, StreamError};
pub use provider::{LlmProvider, ResponseChunk, ToolCallDelta, ToolCallFormat};
pub use tool::ToolInvocation;
