//! Canopy Core - the virtual workspace behind the Canopy coding assistant
//!
//! This crate provides:
//! - The immutable workspace tree ([`PathTree`], [`FileNode`])
//! - Slash-delimited path parsing ([`WorkspacePath`])
//! - Pure file system operations over the tree ([`ops`])
//! - Configuration management and shared error types

pub mod config;
pub mod error;
pub mod ops;
pub mod path;
pub mod tree;

pub use config::{Config, ConfigError};
pub use error::CanopyCoreError;
pub use ops::WriteMode;
pub use path::{PathError, WorkspacePath};
pub use tree::{FileNode, PathTree};
