//! Blob storage for raw document bodies.
//!
//! The inverted index only keeps term frequencies; bodies are written here by
//! the leader before the `AddDocument` entry is proposed and read back by
//! every replica while applying it.

mod blob_store;
mod fs_store;
mod memory;

pub use blob_store::{document_key, BlobStore};
pub use fs_store::FsBlobStore;
pub use memory::MemoryBlobStore;
