//! Declarative query trees.
//!
//! A [`QueryNode`] is what the parser produces and what feedback expansion builds.
//! It holds no cursors; [`QueryNode::compile`] checks it against a retrieval model
//! and turns it into an executable [`SopNode`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::model::{OperatorKind, RetrievalModel};
use crate::query::iop::{IopNode, ProximityKind};
use crate::query::sop::{CombineOp, ScoreOp, SopNode};

/// Field searched by terms without a field suffix.
pub const DEFAULT_FIELD: &str = "body";

/// A node of a declarative query tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    /// A term in one field.
    Term {
        /// The term text.
        term: String,
        /// The field searched.
        field: String,
    },
    /// A proximity operator over inverted-list arguments.
    Proximity {
        /// NEAR or WINDOW.
        kind: ProximityKind,
        /// Maximum gap (NEAR) or exclusive span (WINDOW).
        distance: u32,
        /// Terms or nested proximity operators.
        args: Vec<QueryNode>,
    },
    /// A score operator.
    Score {
        /// The operator.
        kind: OperatorKind,
        /// Arguments.
        args: Vec<QueryNode>,
        /// One weight per argument for weighted operators.
        weights: Option<Vec<f64>>,
    },
}

impl QueryNode {
    /// A term in the default field.
    pub fn term<T: Into<String>>(term: T) -> Self {
        Self::term_in(DEFAULT_FIELD, term)
    }

    /// A term in the given field.
    pub fn term_in<F: Into<String>, T: Into<String>>(field: F, term: T) -> Self {
        QueryNode::Term {
            term: term.into(),
            field: field.into(),
        }
    }

    /// `#near/distance` over the arguments.
    pub fn near(distance: u32, args: Vec<QueryNode>) -> Self {
        QueryNode::Proximity {
            kind: ProximityKind::Near,
            distance,
            args,
        }
    }

    /// `#window/distance` over the arguments.
    pub fn window(distance: u32, args: Vec<QueryNode>) -> Self {
        QueryNode::Proximity {
            kind: ProximityKind::Window,
            distance,
            args,
        }
    }

    /// An unweighted score operator.
    pub fn operator(kind: OperatorKind, args: Vec<QueryNode>) -> Self {
        QueryNode::Score {
            kind,
            args,
            weights: None,
        }
    }

    /// A weighted score operator from `(weight, argument)` pairs.
    pub fn weighted(kind: OperatorKind, pairs: Vec<(f64, QueryNode)>) -> Self {
        let (weights, args) = pairs.into_iter().unzip();
        QueryNode::Score {
            kind,
            args,
            weights: Some(weights),
        }
    }

    /// Every `(field, term)` leaf in the tree, in query order.
    pub fn terms(&self) -> Vec<(&str, &str)> {
        let mut terms = Vec::new();
        self.collect_terms(&mut terms);
        terms
    }

    fn collect_terms<'a>(&'a self, terms: &mut Vec<(&'a str, &'a str)>) {
        match self {
            QueryNode::Term { term, field } => terms.push((field.as_str(), term.as_str())),
            QueryNode::Proximity { args, .. } | QueryNode::Score { args, .. } => {
                for arg in args {
                    arg.collect_terms(terms);
                }
            }
        }
    }

    /// Build the executable tree for a retrieval model.
    ///
    /// Fails with a configuration error when the model does not support an
    /// operator, when proximity parameters are invalid, or when weights do not
    /// fit their operator. Inverted-list arguments of score operators are wrapped
    /// in SCORE.
    pub fn compile(&self, model: &RetrievalModel) -> Result<SopNode> {
        match self {
            QueryNode::Term { .. } | QueryNode::Proximity { .. } => {
                Ok(SopNode::Score(ScoreOp::new(self.compile_iop()?)))
            }
            QueryNode::Score {
                kind,
                args,
                weights,
            } => {
                model.check_supports(*kind)?;

                if *kind == OperatorKind::Score {
                    return match args.as_slice() {
                        [arg] => Ok(SopNode::Score(ScoreOp::new(arg.compile_iop()?))),
                        _ => Err(PilumError::configuration(format!(
                            "SCORE takes exactly one argument, found {}",
                            args.len()
                        ))),
                    };
                }

                let weights = match (kind.is_weighted(), weights) {
                    (true, Some(weights)) => weights.clone(),
                    (false, None) => vec![1.0; args.len()],
                    (true, None) => {
                        return Err(PilumError::configuration(format!(
                            "{kind} requires a weight for each argument"
                        )));
                    }
                    (false, Some(_)) => {
                        return Err(PilumError::configuration(format!(
                            "{kind} does not take weights"
                        )));
                    }
                };

                let compiled = args
                    .iter()
                    .map(|arg| arg.compile(model))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SopNode::Combine(CombineOp::weighted(*kind, compiled, weights)?))
            }
        }
    }

    fn compile_iop(&self) -> Result<IopNode> {
        match self {
            QueryNode::Term { term, field } => Ok(IopNode::term(field.as_str(), term.as_str())),
            QueryNode::Proximity {
                kind,
                distance,
                args,
            } => {
                let compiled = args
                    .iter()
                    .map(QueryNode::compile_iop)
                    .collect::<Result<Vec<_>>>()?;
                IopNode::proximity(*kind, *distance, compiled)
            }
            QueryNode::Score { kind, .. } => Err(PilumError::configuration(format!(
                "{kind} cannot be used where an inverted list is expected"
            ))),
        }
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Term { term, field } => write!(f, "{term}.{field}"),
            QueryNode::Proximity {
                kind,
                distance,
                args,
            } => {
                write!(f, "{}/{distance}(", kind.name())?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                f.write_str(" )")
            }
            QueryNode::Score {
                kind,
                args,
                weights,
            } => {
                write!(f, "#{}(", kind.name().to_lowercase())?;
                match weights {
                    Some(weights) => {
                        for (weight, arg) in weights.iter().zip(args) {
                            write!(f, " {weight} {arg}")?;
                        }
                    }
                    None => {
                        for arg in args {
                            write!(f, " {arg}")?;
                        }
                    }
                }
                f.write_str(" )")
            }
        }
    }
}
