//! TREC run files.
//!
//! Each line of a run file is `qid Q0 external-id rank score run-id`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;

use crate::error::{PilumError, Result};
use crate::search::ScoreList;
use crate::store::PostingStore;

/// Writes ranked results in TREC run format.
#[derive(Debug)]
pub struct TrecWriter<W: Write> {
    writer: W,
    run_id: String,
}

impl TrecWriter<BufWriter<File>> {
    /// Create (or truncate) a run file.
    pub fn create<P: AsRef<Path>>(path: P, run_id: &str) -> Result<Self> {
        let file = File::create(path)?;
        Ok(TrecWriter::new(BufWriter::new(file), run_id))
    }
}

impl<W: Write> TrecWriter<W> {
    /// Wrap a writer.
    pub fn new(writer: W, run_id: &str) -> Self {
        TrecWriter {
            writer,
            run_id: run_id.to_string(),
        }
    }

    /// Write the results of one query in their current order and return the
    /// number of lines written.
    ///
    /// A query without results gets a single placeholder row so that evaluation
    /// tools still see the query.
    pub fn write_results(
        &mut self,
        qid: &str,
        results: &ScoreList,
        store: &dyn PostingStore,
    ) -> Result<usize> {
        if results.is_empty() {
            log::warn!("Query {qid} has no results, writing a placeholder row");
            writeln!(self.writer, "{qid} Q0 dummy 1 0 {}", self.run_id)?;
            return Ok(1);
        }

        for (rank, entry) in results.iter().enumerate() {
            let external_id = store.external_id(entry.doc_id)?;
            writeln!(
                self.writer,
                "{qid} Q0 {external_id} {} {} {}",
                rank + 1,
                entry.score,
                self.run_id
            )?;
        }
        Ok(results.len())
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// The rows of one query in an initial ranking file, in file order.
///
/// External ids are kept as written; they are resolved against a store only when
/// the query is processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialRanking {
    rows: Vec<(String, f64)>,
}

impl InitialRanking {
    /// Add a row. A document already listed for this query keeps its first score.
    pub fn add(&mut self, external_id: &str, score: f64) -> bool {
        if self.rows.iter().any(|(listed, _)| listed == external_id) {
            return false;
        }
        self.rows.push((external_id.to_string(), score));
        true
    }

    /// Number of distinct documents.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no row was read.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Translate the rows into a ranked score list.
    ///
    /// An unknown or ambiguous external id is a lookup error.
    pub fn resolve(&self, store: &dyn PostingStore) -> Result<ScoreList> {
        let mut ranking = ScoreList::new();
        for (external_id, score) in &self.rows {
            ranking.add(store.internal_id(external_id)?, *score);
        }
        ranking.sort();
        Ok(ranking)
    }
}

/// Read a TREC run file into one initial ranking per query id.
pub fn read_initial_ranking<P: AsRef<Path>>(path: P) -> Result<AHashMap<String, InitialRanking>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let mut rankings: AHashMap<String, InitialRanking> = AHashMap::new();

    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let columns: Vec<&str> = line.split_whitespace().collect();
        let [qid, _, external_id, _, score, ..] = columns.as_slice() else {
            return Err(PilumError::parse(format!(
                "{}:{}: expected 'qid Q0 docid rank score run', found '{line}'",
                path.display(),
                number + 1
            )));
        };
        let score: f64 = score.parse().map_err(|_| {
            PilumError::parse(format!(
                "{}:{}: invalid score '{score}'",
                path.display(),
                number + 1
            ))
        })?;

        if !rankings
            .entry(qid.to_string())
            .or_default()
            .add(external_id, score)
        {
            log::warn!(
                "{}:{}: {external_id} repeated for query {qid}, keeping the first score",
                path.display(),
                number + 1
            );
        }
    }

    log::info!(
        "Read initial rankings for {} queries from {}",
        rankings.len(),
        path.display()
    );
    Ok(rankings)
}
