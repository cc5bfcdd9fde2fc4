//! `memoria-core`: shared types, configuration and errors for the memoria
//! workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CompressionConfig, MemoriaConfig};
pub use error::{MemoriaError, Result};
pub use types::{Message, MessageKind, Schedule};
