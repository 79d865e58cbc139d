// # Dedupe Store Implementations
//
// This module provides implementations of the DedupeStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileDedupeStore, FileDedupeStoreFactory, StateFileFormat};
pub use memory::{MemoryDedupeStore, MemoryDedupeStoreFactory};
