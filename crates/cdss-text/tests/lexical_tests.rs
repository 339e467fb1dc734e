use std::sync::Arc;

use cdss_core::chunker::split;
use cdss_core::traits::Retriever;
use cdss_core::{Chunk, Document, Error};
use cdss_text::LexicalIndex;

fn corpus(texts: &[&str]) -> Arc<[Chunk]> {
    let docs: Vec<Document> = texts.iter().enumerate().map(|(i, t)| Document::new(format!("doc{i}"), *t)).collect();
    Arc::from(split(&docs, 500, 50).expect("split"))
}

fn ehr() -> Arc<[Chunk]> {
    corpus(&["Type 2 Diabetes diagnosed 2020", "Metformin 500mg BID", "HbA1c 7.5% last month"])
}

#[test]
fn lab_question_hits_lab_chunk() {
    let index = LexicalIndex::build(ehr()).expect("build");
    assert_eq!(index.len(), 3);
    let hits = index.query("What is the patient's HbA1c?", 5).expect("query");
    assert_eq!(hits.ordinals(), vec![2]);
    assert!(hits.hits()[0].score > 0.0);
}

#[test]
fn no_matching_term_is_an_empty_list() {
    let index = LexicalIndex::build(ehr()).expect("build");
    assert!(index.query("creatinine clearance", 5).expect("query").is_empty());
    assert!(index.query("what is the", 5).expect("stop words only").is_empty());
    assert!(index.query("", 5).expect("empty query").is_empty());
}

#[test]
fn term_frequency_and_rarity_drive_ranking() {
    let index = LexicalIndex::build(corpus(&[
        "insulin insulin insulin",
        "insulin dose adjusted",
        "insulin and lisinopril reviewed at follow up visit",
    ]))
    .expect("build");
    let hits = index.query("insulin", 5).expect("query");
    assert_eq!(hits.ordinals()[0], 0, "higher tf in a short chunk ranks first");

    let hits = index.query("insulin lisinopril", 5).expect("query");
    assert_eq!(hits.ordinals()[0], 2, "the rare term outweighs repeated common ones");
}

#[test]
fn k_caps_the_list() {
    let index = LexicalIndex::build(corpus(&["metformin a", "metformin b", "metformin c", "metformin d"])).expect("build");
    assert_eq!(index.query("metformin", 2).expect("query").len(), 2);
    assert!(matches!(index.query("metformin", 0), Err(Error::InvalidConfig(_))));
}

#[test]
fn equal_scores_follow_insertion_order() {
    let index = LexicalIndex::build(corpus(&["aspirin daily", "statin nightly", "aspirin daily", "aspirin daily"])).expect("build");
    let hits = index.query("aspirin", 5).expect("query");
    assert_eq!(hits.ordinals(), vec![0, 2, 3]);
    let hits = index.query("aspirin", 2).expect("query");
    assert_eq!(hits.ordinals(), vec![0, 2]);
}

#[test]
fn queries_are_repeatable() {
    let index = LexicalIndex::build(ehr()).expect("build");
    let a = index.retrieve("metformin diabetes 2020", 5).expect("query");
    let b = index.retrieve("metformin diabetes 2020", 5).expect("query");
    assert_eq!(a, b);
    assert_eq!(index.name(), "lexical");
    assert_eq!(a.ids(), vec!["doc0:0", "doc1:0"]);
}

#[test]
fn analyzer_keeps_clinical_terms_and_drops_function_words() {
    use cdss_text::tantivy_utils::clinical_analyzer;
    use tantivy::tokenizer::TokenStream;

    let mut analyzer = clinical_analyzer();
    let long = "x".repeat(64);
    let text = format!("What is the patient's HbA1c? Metformin BID {long}");
    let mut stream = analyzer.token_stream(&text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    assert_eq!(tokens, vec!["patient", "s", "hba1c", "metformin", "bid"]);
}
