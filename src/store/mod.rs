//! Posting store layer.
//!
//! Query evaluation treats the index as an external, read-only collaborator behind
//! the [`PostingStore`] trait. The store hands out whole inverted lists, per-field
//! statistics, term vectors and id translation; it never sees query operators.
//!
//! [`MemoryStore`] is an in-memory implementation over pre-tokenized documents. It is
//! used by tests and benchmarks and can be loaded from a JSON corpus file.

pub mod memory;
pub mod posting;
pub mod traits;

// Re-export commonly used types
pub use memory::*;
pub use posting::*;
pub use traits::*;
