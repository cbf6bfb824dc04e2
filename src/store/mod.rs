//! Persistence collaborators for overrides and the long-lived price archive.

pub mod disk;
pub mod json;
pub mod memory;

pub use disk::DiskPriceArchive;
pub use json::JsonOverrideFile;
pub use memory::{MemoryOverrideBackend, MemoryPriceArchive};
