//! Integration tests for batch runs driven by parameter files.

use std::fs;
use std::path::Path;

use pilum::config::EvalConfig;
use pilum::prelude::*;
use pilum::run::run_config;
use tempfile::TempDir;

const CORPUS: &str = r#"{
  "documents": [
    {"external_id": "GX000-00", "fields": {"body": ["apple", "pie", "with", "apple", "crumble"]}},
    {"external_id": "GX000-01", "fields": {"body": ["cherry", "pie", "recipe"]}},
    {"external_id": "GX000-02", "fields": {"body": ["apple", "orchard", "tour"]}},
    {"external_id": "GX000-03", "fields": {"body": ["car", "repair", "manual"]}},
    {"external_id": "GX000-04", "fields": {"body": ["boat", "tour"]}},
    {"external_id": "GX000-05", "fields": {"body": ["dog", "walk"]}}
  ]
}"#;

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

fn rows(path: &str) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line.split(' ').map(str::to_string).collect())
        .collect()
}

#[test]
fn test_bm25_run_writes_trec_rows() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let index = write(dir.path(), "corpus.json", CORPUS);
    let queries = write(
        dir.path(),
        "queries.txt",
        "10:apple pie\n11:#sum(#and(apple pie)\n12:zebra\n\n13:#near/1(apple pie)\n",
    );
    let output = dir.path().join("run.teIn").display().to_string();
    let params = format!(
        "indexPath={index}\nqueryFilePath={queries}\ntrecEvalOutputPath={output}\n\
         trecEvalOutputLength=2\nretrievalAlgorithm=BM25\nBM25:k_1=1.2\nBM25:b=0.75\nBM25:k_3=0\n"
    );
    let config = EvalConfig::load(write(dir.path(), "params.txt", &params))?;

    let store = MemoryStore::from_json_file(&config.index_path)?;
    let summary = run_config(&store, &config)?;
    assert_eq!(summary.queries, 4);
    assert_eq!(summary.failed, 1);

    let rows = rows(&output);
    assert_eq!(summary.rows, rows.len());

    let query_10: Vec<&Vec<String>> = rows.iter().filter(|row| row[0] == "10").collect();
    assert_eq!(query_10.len(), 2);
    assert_eq!(query_10[0][1], "Q0");
    assert_eq!(query_10[0][2], "GX000-00");
    assert_eq!(query_10[0][3], "1");
    assert_eq!(query_10[1][3], "2");
    assert!(rows.iter().all(|row| row.len() == 6 && row[5] == "run-1"));

    let query_12: Vec<&Vec<String>> = rows.iter().filter(|row| row[0] == "12").collect();
    assert_eq!(query_12.len(), 1);
    assert_eq!(query_12[0][2], "dummy");

    let query_13: Vec<&Vec<String>> = rows.iter().filter(|row| row[0] == "13").collect();
    assert_eq!(query_13.len(), 1);
    assert_eq!(query_13[0][2], "GX000-00");
    Ok(())
}

#[test]
fn test_indri_feedback_run() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let index = write(dir.path(), "corpus.json", CORPUS);
    let queries = write(dir.path(), "queries.txt", "1:apple\n2:repair\n");
    let output = dir.path().join("run.teIn");
    let expansion = dir.path().join("expansion.qry");
    fs::write(&expansion, "stale line\n").unwrap();

    let params = serde_json::json!({
        "indexPath": index,
        "queryFilePath": queries,
        "trecEvalOutputPath": output,
        "retrievalAlgorithm": "Indri",
        "runId": "fb-run",
        "Indri:mu": 100.0,
        "Indri:lambda": 0.4,
        "fb": true,
        "fbDocs": 2,
        "fbTerms": 3,
        "fbMu": 0.0,
        "fbOrigWeight": 0.5,
        "fbExpansionQueryFile": expansion,
    });
    let config = EvalConfig::load(write(dir.path(), "params.json", &params.to_string()))?;
    assert!(RetrievalModel::from_config(&config)?.feedback().is_some());

    let store = MemoryStore::from_json_file(&config.index_path)?;
    let summary = run_config(&store, &config)?;
    assert_eq!(summary.queries, 2);
    assert_eq!(summary.failed, 0);

    let expansions = fs::read_to_string(&expansion).unwrap();
    let lines: Vec<&str> = expansions.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("1: #wand ( "));
    assert!(lines[0].ends_with(" )"));
    assert!(lines[1].starts_with("2: #wand ( "));

    let rows = rows(&output.display().to_string());
    assert_eq!(summary.rows, rows.len());
    assert!(rows.iter().any(|row| row[0] == "1" && row[2] == "GX000-00"));
    assert!(rows.iter().any(|row| row[0] == "2" && row[2] == "GX000-03"));
    assert!(rows.iter().all(|row| row[2] != "dummy" && row[5] == "fb-run"));
    Ok(())
}

#[test]
fn test_initial_ranking_file_feeds_expansion() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let index = write(dir.path(), "corpus.json", CORPUS);
    let queries = write(dir.path(), "queries.txt", "5:pie\n");
    let ranking = write(
        dir.path(),
        "initial.teIn",
        "5 Q0 GX000-03 1 2.0 initial\n5 Q0 GX000-01 2 1.0 initial\n",
    );
    let output = dir.path().join("run.teIn").display().to_string();
    let expansion = dir.path().join("expansion.qry").display().to_string();

    let params = format!(
        "indexPath={index}\nqueryFilePath={queries}\ntrecEvalOutputPath={output}\n\
         retrievalAlgorithm=indri\nIndri:mu=100\nIndri:lambda=0.4\nfb=true\nfbDocs=1\n\
         fbTerms=10\nfbMu=0\nfbOrigWeight=0.5\nfbInitialRankingFile={ranking}\n\
         fbExpansionQueryFile={expansion}\n"
    );
    let config = EvalConfig::load(write(dir.path(), "params.txt", &params))?;
    let store = MemoryStore::from_json_file(&config.index_path)?;
    run_config(&store, &config)?;

    // Only the top document of the supplied ranking is mined.
    let line = fs::read_to_string(&expansion).unwrap();
    for term in ["car", "repair", "manual"] {
        assert!(line.contains(term), "{term} missing from {line}");
    }
    assert!(!line.contains("pie"));
    Ok(())
}

#[test]
fn test_unknown_document_in_initial_ranking_fails_one_query() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let index = write(dir.path(), "corpus.json", CORPUS);
    let queries = write(dir.path(), "queries.txt", "1:apple\n2:pie\n");
    let ranking = write(
        dir.path(),
        "initial.teIn",
        "1 Q0 GX000-00 1 2.0 initial\n2 Q0 GX999-99 1 1.0 initial\n",
    );
    let output = dir.path().join("run.teIn").display().to_string();
    let expansion = dir.path().join("expansion.qry").display().to_string();

    let params = format!(
        "indexPath={index}\nqueryFilePath={queries}\ntrecEvalOutputPath={output}\n\
         retrievalAlgorithm=indri\nIndri:mu=100\nIndri:lambda=0.4\nfb=true\nfbDocs=1\n\
         fbTerms=5\nfbMu=0\nfbOrigWeight=0.5\nfbInitialRankingFile={ranking}\n\
         fbExpansionQueryFile={expansion}\n"
    );
    let config = EvalConfig::load(write(dir.path(), "params.txt", &params))?;
    let store = MemoryStore::from_json_file(&config.index_path)?;
    let summary = run_config(&store, &config)?;

    assert_eq!(summary.queries, 2);
    assert_eq!(summary.failed, 1);

    let rows = rows(&output);
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|row| row[0] == "1"));
    assert!(rows.iter().any(|row| row[2] == "GX000-00"));
    Ok(())
}

#[test]
fn test_missing_parameters_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "params.txt",
        "indexPath=corpus.json\nqueryFilePath=q.txt\nretrievalAlgorithm=bm25\n",
    );
    assert!(EvalConfig::load(path).unwrap_err().is_configuration());

    let path = write(
        dir.path(),
        "bm25.txt",
        "indexPath=c.json\nqueryFilePath=q.txt\ntrecEvalOutputPath=o\nretrievalAlgorithm=bm25\nBM25:k_1=1.2\n",
    );
    assert!(EvalConfig::load(path).unwrap_err().is_configuration());
}
