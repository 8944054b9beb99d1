//! Query trees and their evaluation primitives.
//!
//! Queries are parsed into declarative [`QueryNode`] trees, then compiled against a
//! retrieval model into executable trees: [`SopNode`] score operators over
//! [`IopNode`] inverted-list operators.

pub mod iop;
pub mod node;
pub mod parser;
pub mod sop;

pub use self::iop::{IopNode, ProximityKind};
pub use self::node::{DEFAULT_FIELD, QueryNode};
pub use self::parser::{KNOWN_FIELDS, QueryParser};
pub use self::sop::{CombineOp, ScoreOp, SopNode};
