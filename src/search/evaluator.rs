//! Query evaluation.

use std::time::Instant;

use crate::error::Result;
use crate::model::RetrievalModel;
use crate::query::{QueryNode, QueryParser};
use crate::search::score_list::ScoreList;
use crate::store::PostingStore;

/// Evaluates queries against a posting store under one retrieval model.
#[derive(Debug)]
pub struct QueryEvaluator<'a> {
    store: &'a dyn PostingStore,
    model: &'a RetrievalModel,
    parser: QueryParser,
}

impl<'a> QueryEvaluator<'a> {
    /// Create an evaluator.
    pub fn new(store: &'a dyn PostingStore, model: &'a RetrievalModel) -> Self {
        QueryEvaluator {
            store,
            model,
            parser: QueryParser::new(),
        }
    }

    /// Use a custom query parser.
    pub fn with_parser(mut self, parser: QueryParser) -> Self {
        self.parser = parser;
        self
    }

    /// Parse raw query text, wrapping it in the model's default operator.
    pub fn parse(&self, text: &str) -> Result<QueryNode> {
        self.parser
            .parse_with_default(text, self.model.default_operator())
    }

    /// Parse and evaluate raw query text.
    pub fn evaluate_text(&self, text: &str) -> Result<ScoreList> {
        let query = self.parse(text)?;
        self.evaluate(&query)
    }

    /// Score every document the query matches.
    ///
    /// The returned list is in document order; call [`ScoreList::sort`] to rank it.
    pub fn evaluate(&self, query: &QueryNode) -> Result<ScoreList> {
        let start = Instant::now();
        let mut root = query.compile(self.model)?;
        log::debug!("Evaluating {query} under {}", self.model.name());

        root.initialize(self.store)?;

        let mut results = ScoreList::new();
        while root.has_match(self.model) {
            let Some(doc_id) = root.current_doc() else {
                break;
            };
            let score = root.score(self.store, self.model)?;
            results.add(doc_id, score);
            root.advance_past(doc_id);
        }

        log::debug!(
            "Query matched {} documents in {:?}",
            results.len(),
            start.elapsed()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .add_document("d0", &[("body", "apple pie recipe"), ("title", "apple pie")])
            .unwrap();
        store.add_document("d1", &[("body", "cherry pie")]).unwrap();
        store.add_document("d2", &[("body", "apple orchard apple")]).unwrap();
        store
    }

    #[test]
    fn test_default_operator_follows_model() {
        let store = store();
        let ranked = RetrievalModel::RankedBoolean;
        let evaluator = QueryEvaluator::new(&store, &ranked);

        assert_eq!(evaluator.parse("apple").unwrap().to_string(), "#or( apple.body )");
    }

    #[test]
    fn test_evaluate_text_ranked_boolean() {
        let store = store();
        let model = RetrievalModel::RankedBoolean;
        let evaluator = QueryEvaluator::new(&store, &model);

        let mut results = evaluator.evaluate_text("apple pie").unwrap();
        let docs: Vec<(u32, f64)> = results.iter().map(|e| (e.doc_id, e.score)).collect();
        assert_eq!(docs, vec![(0, 1.0), (1, 1.0), (2, 2.0)]);

        results.sort();
        assert_eq!(results.get(0).unwrap().doc_id, 2);
    }

    #[test]
    fn test_unsupported_operator_fails_before_scoring() {
        let store = store();
        let model = RetrievalModel::bm25(1.2, 0.75, 0.0).unwrap();
        let evaluator = QueryEvaluator::new(&store, &model);

        let error = evaluator.evaluate_text("#and(apple pie)").unwrap_err();
        assert!(error.is_configuration());
    }

    #[test]
    fn test_field_suffix() {
        let store = store();
        let model = RetrievalModel::UnrankedBoolean;
        let evaluator = QueryEvaluator::new(&store, &model);

        let results = evaluator.evaluate_text("pie.title").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.get(0).unwrap().doc_id, 0);
    }
}
