//! # Pilum
//!
//! Structured query evaluation over inverted indexes.
//!
//! ## Features
//!
//! - A query language with Boolean, weighted and proximity operators
//!   (`#and`, `#or`, `#sum`, `#wand`, `#wsum`, `#near/k`, `#window/k`)
//! - Unranked and ranked Boolean, BM25 and Indri retrieval models
//! - Pseudo-relevance feedback for the Indri model
//! - Batch runs producing TREC run files
//! - SVMrank feature vectors for learning to rank

pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod feedback;
pub mod model;
pub mod query;
pub mod run;
pub mod search;
pub mod store;

pub mod prelude {
    pub use crate::config::EvalConfig;
    pub use crate::error::{PilumError, Result};
    pub use crate::model::{OperatorKind, RetrievalModel};
    pub use crate::query::{QueryNode, QueryParser};
    pub use crate::search::{QueryEvaluator, ScoreList};
    pub use crate::store::{DocId, MemoryStore, PostingStore};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
