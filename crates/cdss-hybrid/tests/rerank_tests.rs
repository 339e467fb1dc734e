mod common;

use std::sync::Arc;

use cdss_core::Error;
use cdss_hybrid::Reranker;
use common::{chunks, TableScorer};

fn contents(out: &[cdss_core::Chunk]) -> Vec<&str> {
    out.iter().map(|c| c.content.as_str()).collect()
}

#[test]
fn highest_score_first() {
    let scorer = Arc::new(TableScorer::new(&[("alpha", 0.1), ("beta", 2.0), ("gamma", -1.0), ("delta", 0.7)]));
    let reranker = Reranker::new(scorer.clone());
    let out = reranker.rerank("q", &chunks(&["alpha", "beta", "gamma", "delta"]), 3).expect("rerank");
    assert_eq!(contents(&out), vec!["beta", "delta", "alpha"]);
    assert_eq!(scorer.batches(), 1, "one model invocation per query");
}

#[test]
fn empty_input_never_invokes_the_model() {
    let scorer = Arc::new(TableScorer::new(&[]));
    let reranker = Reranker::new(scorer.clone());
    assert!(reranker.rerank("q", &[], 3).expect("rerank").is_empty());
    assert!(reranker.rerank("q", &[], 3).expect("rerank again").is_empty());
    assert_eq!(scorer.batches(), 0);
}

#[test]
fn output_length_is_bounded_by_top_k_and_input() {
    let top_k = 3;
    let reranker = Reranker::new(Arc::new(TableScorer::new(&[])));
    for n in [0, 1, top_k - 1, top_k, top_k + 5] {
        let texts: Vec<String> = (0..n).map(|i| format!("passage {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let input = if refs.is_empty() { Vec::new() } else { chunks(&refs) };
        let out = reranker.rerank("q", &input, top_k).expect("rerank");
        assert_eq!(out.len(), n.min(top_k), "n={n}");
    }
    assert!(matches!(reranker.rerank("q", &chunks(&["x"]), 0), Err(Error::InvalidConfig(_))));
}

#[test]
fn equal_scores_keep_input_order() {
    let reranker = Reranker::new(Arc::new(TableScorer::new(&[("b", 1.0), ("d", 1.0)])));
    let out = reranker.rerank("q", &chunks(&["a", "b", "c", "d"]), 4).expect("rerank");
    assert_eq!(contents(&out), vec!["b", "d", "a", "c"]);
}

#[test]
fn nan_scores_rank_last() {
    let reranker = Reranker::new(Arc::new(TableScorer::new(&[("a", f32::NAN), ("b", -5.0)])));
    let out = reranker.rerank("q", &chunks(&["a", "b"]), 2).expect("rerank");
    assert_eq!(contents(&out), vec!["b", "a"]);
}

#[test]
fn model_failure_keeps_fused_order() {
    let scorer = Arc::new(TableScorer { fail: true, ..TableScorer::new(&[("c", 9.0)]) });
    let reranker = Reranker::new(scorer.clone());
    let out = reranker.rerank("q", &chunks(&["a", "b", "c", "d"]), 3).expect("fail soft");
    assert_eq!(contents(&out), vec!["a", "b", "c"]);
    assert_eq!(scorer.batches(), 1);
}

#[test]
fn partial_score_batch_keeps_fused_order() {
    let reranker = Reranker::new(Arc::new(TableScorer { short: true, ..TableScorer::new(&[("b", 9.0)]) }));
    let out = reranker.rerank("q", &chunks(&["a", "b"]), 5).expect("fail soft");
    assert_eq!(contents(&out), vec!["a", "b"]);
}

#[test]
fn reranking_is_deterministic() {
    let reranker = Reranker::new(Arc::new(TableScorer::new(&[("a", 0.3), ("b", 0.3), ("c", 0.9)])));
    let input = chunks(&["a", "b", "c"]);
    let first = reranker.rerank("q", &input, 3).expect("rerank");
    for _ in 0..5 {
        assert_eq!(reranker.rerank("q", &input, 3).expect("rerank"), first);
    }
}
