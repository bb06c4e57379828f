//! Abstract interfaces for collaborators outside this workspace
//!
//! Traits here are pure interfaces - no concrete implementations.

#[cfg(feature = "alloc")]
pub mod decoder;

#[cfg(feature = "alloc")]
pub use decoder::BlockDecoder;
