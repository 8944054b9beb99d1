//! Score operators.
//!
//! A [`SopNode`] is either a SCORE leaf over one inverted-list operator, or a
//! combining operator (`#and`, `#or`, `#sum`, `#wand`, `#wsum`) over other score
//! operators. The retrieval model decides how children are matched and how their
//! scores combine; unsupported operator/model pairs are rejected when the tree is
//! compiled, so the formulas here only see valid combinations.

use crate::error::{PilumError, Result};
use crate::model::{OperatorKind, RetrievalModel};
use crate::query::iop::IopNode;
use crate::store::{DocId, PostingStore};

/// Field-level statistics cached by a SCORE leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct FieldStats {
    num_docs: f64,
    avg_length: f64,
    collection_length: f64,
}

/// SCORE: turns the current posting of an inverted-list operator into a score.
#[derive(Debug)]
pub struct ScoreOp {
    arg: IopNode,
    stats: FieldStats,
}

/// A combining score operator.
#[derive(Debug)]
pub struct CombineOp {
    kind: OperatorKind,
    args: Vec<SopNode>,
    weights: Vec<f64>,
    weight_sum: f64,
    matched: Option<DocId>,
}

/// A node of a compiled query tree that produces scores.
#[derive(Debug)]
pub enum SopNode {
    /// A SCORE leaf.
    Score(ScoreOp),
    /// A combining operator.
    Combine(CombineOp),
}

impl ScoreOp {
    /// Wrap an inverted-list operator.
    pub fn new(arg: IopNode) -> Self {
        ScoreOp {
            arg,
            stats: FieldStats::default(),
        }
    }

    /// The wrapped inverted-list operator.
    pub fn arg(&self) -> &IopNode {
        &self.arg
    }

    fn initialize(&mut self, store: &dyn PostingStore) -> Result<()> {
        self.arg.initialize(store)?;
        let field = self.arg.field();
        self.stats = FieldStats {
            num_docs: store.num_docs()? as f64,
            avg_length: store.avg_field_length(field)?,
            collection_length: store.sum_field_lengths(field)? as f64,
        };
        Ok(())
    }

    fn score(&self, store: &dyn PostingStore, model: &RetrievalModel) -> Result<f64> {
        let posting = self
            .arg
            .current_posting()
            .ok_or_else(|| PilumError::other("SCORE evaluated without a current document"))?;
        let tf = posting.tf() as f64;

        match model {
            RetrievalModel::UnrankedBoolean => Ok(1.0),
            RetrievalModel::RankedBoolean => Ok(tf),
            RetrievalModel::Bm25(params) => {
                let df = self.arg.df() as f64;
                let doc_length = store.field_length(self.arg.field(), posting.doc_id)? as f64;

                let idf = ((self.stats.num_docs - df + 0.5) / (df + 0.5)).ln().max(0.0);
                let norm = params.k1
                    * ((1.0 - params.b) + params.b * doc_length / self.stats.avg_length);
                let tf_weight = tf / (tf + norm);
                // Query terms are not repeated, so qtf is 1.
                let user_weight = (params.k3 + 1.0) / (params.k3 + 1.0);
                Ok(idf * tf_weight * user_weight)
            }
            RetrievalModel::Indri(params) => {
                let doc_length = store.field_length(self.arg.field(), posting.doc_id)? as f64;
                Ok(self.indri(tf, doc_length, params.mu, params.lambda))
            }
        }
    }

    fn default_score(
        &self,
        store: &dyn PostingStore,
        model: &RetrievalModel,
        doc_id: DocId,
    ) -> Result<f64> {
        match model {
            RetrievalModel::Indri(params) => {
                let doc_length = store.field_length(self.arg.field(), doc_id)? as f64;
                Ok(self.indri(0.0, doc_length, params.mu, params.lambda))
            }
            other => Err(PilumError::configuration(format!(
                "{} has no default score for {}",
                other.name(),
                OperatorKind::Score
            ))),
        }
    }

    fn indri(&self, tf: f64, doc_length: f64, mu: f64, lambda: f64) -> f64 {
        // Unseen terms get half an occurrence.
        let ctf = match self.arg.ctf() {
            0 => 0.5,
            ctf => ctf as f64,
        };
        // A field absent from the corpus behaves as a one-token collection.
        let mle = ctf / self.stats.collection_length.max(1.0);
        (1.0 - lambda) * (tf + mu * mle) / (doc_length + mu) + lambda * mle
    }
}

impl CombineOp {
    /// Create an unweighted combining operator.
    pub fn new(kind: OperatorKind, args: Vec<SopNode>) -> Result<Self> {
        let weights = vec![1.0; args.len()];
        Self::weighted(kind, args, weights)
    }

    /// Create a combining operator with one weight per argument.
    pub fn weighted(kind: OperatorKind, args: Vec<SopNode>, weights: Vec<f64>) -> Result<Self> {
        if kind == OperatorKind::Score {
            return Err(PilumError::configuration(
                "SCORE takes an inverted-list argument",
            ));
        }
        if args.is_empty() {
            return Err(PilumError::configuration(format!(
                "{kind} requires at least one argument"
            )));
        }
        if weights.len() != args.len() {
            return Err(PilumError::configuration(format!(
                "{kind} has {} arguments but {} weights",
                args.len(),
                weights.len()
            )));
        }
        if let Some(weight) = weights.iter().find(|w| !(**w >= 0.0) || !w.is_finite()) {
            return Err(PilumError::configuration(format!(
                "{kind} weight {weight} must be a non-negative number"
            )));
        }
        let weight_sum: f64 = weights.iter().sum();
        if weight_sum <= 0.0 {
            return Err(PilumError::configuration(format!(
                "{kind} weights must not all be zero"
            )));
        }

        Ok(CombineOp {
            kind,
            args,
            weights,
            weight_sum,
            matched: None,
        })
    }

    /// The operator kind.
    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    /// The operator's arguments.
    pub fn args(&self) -> &[SopNode] {
        &self.args
    }

    fn uses_match_min(&self, model: &RetrievalModel) -> bool {
        match self.kind {
            OperatorKind::And | OperatorKind::WAnd => model.is_language_model(),
            OperatorKind::Or | OperatorKind::Sum | OperatorKind::WSum => true,
            OperatorKind::Score => false,
        }
    }

    fn has_match(&mut self, model: &RetrievalModel) -> bool {
        self.matched = if self.uses_match_min(model) {
            match_min(&mut self.args, model)
        } else {
            match_all(&mut self.args, model)
        };
        self.matched.is_some()
    }

    fn advance_past(&mut self, doc_id: DocId) {
        for arg in self.args.iter_mut() {
            arg.advance_past(doc_id);
        }
        self.matched = None;
    }

    fn score(&mut self, store: &dyn PostingStore, model: &RetrievalModel) -> Result<f64> {
        let doc_id = self.matched.ok_or_else(|| {
            PilumError::other(format!("{} evaluated without a current document", self.kind))
        })?;

        match (self.kind, model) {
            (OperatorKind::And | OperatorKind::Or, RetrievalModel::UnrankedBoolean) => Ok(1.0),
            (OperatorKind::And, RetrievalModel::RankedBoolean) => {
                let scores = self.matching_scores(doc_id, store, model)?;
                Ok(scores.into_iter().flatten().fold(f64::INFINITY, f64::min))
            }
            (OperatorKind::Or, RetrievalModel::RankedBoolean) => {
                let scores = self.matching_scores(doc_id, store, model)?;
                Ok(scores.into_iter().flatten().fold(0.0, f64::max))
            }
            (OperatorKind::Sum, RetrievalModel::Bm25(_)) => {
                let scores = self.matching_scores(doc_id, store, model)?;
                Ok(scores.into_iter().flatten().sum())
            }
            (OperatorKind::And | OperatorKind::WAnd | OperatorKind::WSum, RetrievalModel::Indri(_)) => {
                let scores = self.matching_scores(doc_id, store, model)?;
                let mut filled = Vec::with_capacity(scores.len());
                for (arg, score) in self.args.iter().zip(scores) {
                    filled.push(match score {
                        Some(score) => score,
                        None => arg.default_score(store, model, doc_id)?,
                    });
                }
                Ok(self.combine_indri(&filled))
            }
            (kind, model) => Err(PilumError::unsupported(kind.name(), model.name())),
        }
    }

    fn default_score(
        &self,
        store: &dyn PostingStore,
        model: &RetrievalModel,
        doc_id: DocId,
    ) -> Result<f64> {
        match (self.kind, model) {
            (OperatorKind::And | OperatorKind::WAnd | OperatorKind::WSum, RetrievalModel::Indri(_)) => {
                let scores = self
                    .args
                    .iter()
                    .map(|arg| arg.default_score(store, model, doc_id))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.combine_indri(&scores))
            }
            (kind, model) => Err(PilumError::configuration(format!(
                "{} has no default score for {kind}",
                model.name()
            ))),
        }
    }

    /// Score every argument positioned on `doc_id`; `None` for the others.
    fn matching_scores(
        &mut self,
        doc_id: DocId,
        store: &dyn PostingStore,
        model: &RetrievalModel,
    ) -> Result<Vec<Option<f64>>> {
        let mut scores = Vec::with_capacity(self.args.len());
        for arg in self.args.iter_mut() {
            if arg.has_match(model) && arg.current_doc() == Some(doc_id) {
                scores.push(Some(arg.score(store, model)?));
            } else {
                scores.push(None);
            }
        }
        Ok(scores)
    }

    fn combine_indri(&self, scores: &[f64]) -> f64 {
        match self.kind {
            OperatorKind::WSum => scores
                .iter()
                .zip(&self.weights)
                .map(|(score, weight)| score * weight / self.weight_sum)
                .sum(),
            _ => scores
                .iter()
                .zip(&self.weights)
                .map(|(score, weight)| score.powf(weight / self.weight_sum))
                .product(),
        }
    }
}

/// Match documents that every argument matches. Returns the document all arguments
/// sit on, or `None` once any argument is exhausted.
fn match_all(args: &mut [SopNode], model: &RetrievalModel) -> Option<DocId> {
    loop {
        let mut target = 0;
        for arg in args.iter_mut() {
            if !arg.has_match(model) {
                return None;
            }
            target = target.max(arg.current_doc()?);
        }

        let mut aligned = true;
        for arg in args.iter_mut() {
            if arg.current_doc()? < target {
                arg.advance_past(target - 1);
                aligned = false;
            }
        }
        if aligned {
            return Some(target);
        }
    }
}

/// Match the smallest document any argument matches.
fn match_min(args: &mut [SopNode], model: &RetrievalModel) -> Option<DocId> {
    let mut min = None;
    for arg in args.iter_mut() {
        if arg.has_match(model)
            && let Some(doc_id) = arg.current_doc()
        {
            min = Some(min.map_or(doc_id, |current: DocId| current.min(doc_id)));
        }
    }
    min
}

impl SopNode {
    /// Evaluate every inverted-list operator below this node and cache the
    /// statistics its formulas need.
    pub fn initialize(&mut self, store: &dyn PostingStore) -> Result<()> {
        match self {
            SopNode::Score(op) => op.initialize(store),
            SopNode::Combine(op) => {
                op.matched = None;
                op.args.iter_mut().try_for_each(|arg| arg.initialize(store))
            }
        }
    }

    /// Whether the node matches some document at or after its cursors.
    ///
    /// Combining operators position their children and remember the candidate, so
    /// [`SopNode::current_doc`] is only meaningful after this returned `true`.
    pub fn has_match(&mut self, model: &RetrievalModel) -> bool {
        match self {
            SopNode::Score(op) => op.arg.has_match(),
            SopNode::Combine(op) => op.has_match(model),
        }
    }

    /// The matched document.
    pub fn current_doc(&self) -> Option<DocId> {
        match self {
            SopNode::Score(op) => op.arg.current_doc(),
            SopNode::Combine(op) => op.matched,
        }
    }

    /// Move past `doc_id`.
    pub fn advance_past(&mut self, doc_id: DocId) {
        match self {
            SopNode::Score(op) => op.arg.advance_past(doc_id),
            SopNode::Combine(op) => op.advance_past(doc_id),
        }
    }

    /// Score the matched document.
    pub fn score(&mut self, store: &dyn PostingStore, model: &RetrievalModel) -> Result<f64> {
        match self {
            SopNode::Score(op) => op.score(store, model),
            SopNode::Combine(op) => op.score(store, model),
        }
    }

    /// Score `doc_id` as if none of this node's terms occurred in it.
    ///
    /// Only language models define default scores.
    pub fn default_score(
        &self,
        store: &dyn PostingStore,
        model: &RetrievalModel,
        doc_id: DocId,
    ) -> Result<f64> {
        match self {
            SopNode::Score(op) => op.default_score(store, model, doc_id),
            SopNode::Combine(op) => op.default_score(store, model, doc_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bm25Params;
    use crate::query::iop::ProximityKind;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_document("d0", &[("body", "a b a")]).unwrap();
        store.add_document("d1", &[("body", "b c")]).unwrap();
        store.add_document("d2", &[("body", "a c c c")]).unwrap();
        store.add_document("d3", &[("body", "d")]).unwrap();
        store
    }

    fn score(term: &str) -> SopNode {
        SopNode::Score(ScoreOp::new(IopNode::term("body", term)))
    }

    fn combine(kind: OperatorKind, terms: &[&str]) -> SopNode {
        SopNode::Combine(CombineOp::new(kind, terms.iter().map(|t| score(t)).collect()).unwrap())
    }

    fn run(mut root: SopNode, store: &MemoryStore, model: &RetrievalModel) -> Vec<(DocId, f64)> {
        root.initialize(store).unwrap();
        let mut results = Vec::new();
        while root.has_match(model) {
            let doc = root.current_doc().unwrap();
            results.push((doc, root.score(store, model).unwrap()));
            root.advance_past(doc);
        }
        results
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_unranked_boolean() {
        let store = store();
        let model = RetrievalModel::UnrankedBoolean;

        let and = run(combine(OperatorKind::And, &["a", "b"]), &store, &model);
        assert_eq!(and, vec![(0, 1.0)]);

        let or = run(combine(OperatorKind::Or, &["a", "b"]), &store, &model);
        assert_eq!(or, vec![(0, 1.0), (1, 1.0), (2, 1.0)]);
    }

    #[test]
    fn test_ranked_boolean_min_and_max() {
        let store = store();
        let model = RetrievalModel::RankedBoolean;

        let and = run(combine(OperatorKind::And, &["a", "b"]), &store, &model);
        assert_eq!(and, vec![(0, 1.0)]);

        let or = run(combine(OperatorKind::Or, &["a", "c"]), &store, &model);
        assert_eq!(or, vec![(0, 2.0), (1, 1.0), (2, 3.0)]);
    }

    #[test]
    fn test_bm25_sum_of_matching_terms() {
        let store = store();
        let params = Bm25Params::default();
        let model = RetrievalModel::Bm25(params);

        let results = run(combine(OperatorKind::Sum, &["a", "d"]), &store, &model);
        let docs: Vec<DocId> = results.iter().map(|(doc, _)| *doc).collect();
        assert_eq!(docs, vec![0, 2, 3]);

        // d3 only matches "d": N=4, df=1, tf=1, dl=1, avgLen=10/4.
        let idf = ((4.0 - 1.0 + 0.5) / 1.5f64).ln();
        let norm = 1.2 * (0.25 + 0.75 * 1.0 / 2.5);
        assert_close(results[2].1, idf * 1.0 / (1.0 + norm));
    }

    #[test]
    fn test_bm25_idf_is_floored() {
        let store = store();
        let model = RetrievalModel::Bm25(Bm25Params::default());

        // "a" appears in half the corpus: idf clamps to 0.
        let results = run(combine(OperatorKind::Sum, &["a"]), &store, &model);
        assert!(results.iter().all(|(_, s)| *s == 0.0));
    }

    #[test]
    fn test_indri_and_uses_default_scores() {
        let store = store();
        let model = RetrievalModel::indri(2.0, 0.5).unwrap();

        let results = run(combine(OperatorKind::And, &["b", "d"]), &store, &model);
        let docs: Vec<DocId> = results.iter().map(|(doc, _)| *doc).collect();
        assert_eq!(docs, vec![0, 1, 3]);

        // d1: "b" matches (tf 1, dl 2), "d" does not.
        let collection: f64 = 10.0;
        let b_mle = 2.0 / collection;
        let d_mle = 1.0 / collection;
        let b = 0.5 * (1.0 + 2.0 * b_mle) / (2.0 + 2.0) + 0.5 * b_mle;
        let d = 0.5 * (2.0 * d_mle) / (2.0 + 2.0) + 0.5 * d_mle;
        assert_close(results[1].1, (b * d).sqrt());
    }

    #[test]
    fn test_indri_default_score_floors_unseen_terms() {
        let store = store();
        let model = RetrievalModel::indri(0.0, 1.0).unwrap();
        let mut unseen = score("zebra");
        unseen.initialize(&store).unwrap();

        assert_close(unseen.default_score(&store, &model, 0).unwrap(), 0.5 / 10.0);
        assert!(!unseen.has_match(&model));
    }

    #[test]
    fn test_indri_weighted_operators() {
        let store = store();
        let model = RetrievalModel::indri(2.0, 0.5).unwrap();
        let weighted = |kind| {
            SopNode::Combine(
                CombineOp::weighted(kind, vec![score("a"), score("c")], vec![3.0, 1.0]).unwrap(),
            )
        };

        let mut singles = Vec::new();
        for term in ["a", "c"] {
            let mut node = score(term);
            node.initialize(&store).unwrap();
            singles.push(node);
        }
        let a = singles[0].score(&store, &model).unwrap();
        let c = singles[1].default_score(&store, &model, 0).unwrap();

        let wand = run(weighted(OperatorKind::WAnd), &store, &model);
        assert_eq!(wand[0].0, 0);
        assert_close(wand[0].1, a.powf(0.75) * c.powf(0.25));

        let wsum = run(weighted(OperatorKind::WSum), &store, &model);
        assert_eq!(wsum[0].0, 0);
        assert_close(wsum[0].1, a * 0.75 + c * 0.25);
    }

    #[test]
    fn test_nested_default_score_algebra() {
        let store = store();
        let model = RetrievalModel::indri(5.0, 0.2).unwrap();
        let mut inner = combine(OperatorKind::And, &["b", "c"]);
        inner.initialize(&store).unwrap();
        let mut b = score("b");
        b.initialize(&store).unwrap();
        let mut c = score("c");
        c.initialize(&store).unwrap();

        let expected = (b.default_score(&store, &model, 3).unwrap()
            * c.default_score(&store, &model, 3).unwrap())
        .sqrt();
        assert_close(inner.default_score(&store, &model, 3).unwrap(), expected);
    }

    #[test]
    fn test_default_score_requires_language_model() {
        let store = store();
        let mut node = combine(OperatorKind::And, &["a"]);
        node.initialize(&store).unwrap();
        let error = node
            .default_score(&store, &RetrievalModel::RankedBoolean, 0)
            .unwrap_err();
        assert!(error.is_configuration());
    }

    #[test]
    fn test_score_over_proximity() {
        let store = store();
        let model = RetrievalModel::RankedBoolean;
        let near = IopNode::proximity(
            ProximityKind::Near,
            1,
            vec![IopNode::term("body", "a"), IopNode::term("body", "b")],
        )
        .unwrap();
        let root = SopNode::Score(ScoreOp::new(near));

        assert_eq!(run(root, &store, &model), vec![(0, 1.0)]);
    }

    #[test]
    fn test_invalid_combine_operators() {
        assert!(CombineOp::new(OperatorKind::And, Vec::new()).is_err());
        assert!(CombineOp::weighted(OperatorKind::WAnd, vec![score("a")], vec![1.0, 2.0]).is_err());
        assert!(CombineOp::weighted(OperatorKind::WSum, vec![score("a")], vec![-1.0]).is_err());
        assert!(CombineOp::weighted(OperatorKind::WSum, vec![score("a")], vec![0.0]).is_err());
        assert!(CombineOp::new(OperatorKind::Score, vec![score("a")]).is_err());
    }
}
