use std::fs;

use cdss_core::chunker::{split, Chunker, ChunkingConfig};
use cdss_core::config::{Config, Normalization, Settings};
use cdss_core::corpus::{load_documents, records_to_documents, seed_mock_if_missing};
use cdss_core::{Chunk, Document, Error};
use tempfile::TempDir;

fn chunks_of(chunks: &[Chunk], doc_id: &str) -> Vec<Chunk> {
    chunks.iter().filter(|c| c.doc_id == doc_id).cloned().collect()
}

fn long_note() -> String {
    let mut s = String::new();
    for i in 0..12 {
        s.push_str(&format!("Visit {i}. Patient reports fatigue and polyuria. Metformin continued at 500mg twice daily.\n"));
        if i % 3 == 2 {
            s.push('\n');
        }
    }
    s.push_str("Plan: repeat HbA1c in three months and review renal function before dose escalation.");
    s
}

#[test]
fn short_document_is_one_chunk() {
    let docs = vec![Document::new("d1", "Short text").with_meta("type", "Lab")];
    let chunks = split(&docs, 500, 50).expect("split");
    assert_eq!(chunks.len(), 1, "one small document becomes one chunk");
    assert_eq!(chunks[0].content, "Short text");
    assert_eq!(chunks[0].id, "d1:0");
    assert_eq!(chunks[0].metadata.get("type").map(String::as_str), Some("Lab"));
}

#[test]
fn windows_prefer_word_boundaries() {
    let docs = vec![Document::new("d", "alpha beta gamma delta")];
    let chunks = split(&docs, 12, 2).expect("split");
    assert_eq!(chunks[0].content, "alpha beta ");
    for c in &chunks {
        assert!(c.content.chars().count() <= 12);
    }
    assert_eq!(Chunker::reassemble(&chunks), "alpha beta gamma delta");
}

#[test]
fn chunks_cover_document_with_exact_overlap() {
    let text = long_note();
    let docs = vec![Document::new("note", text.clone())];
    for (size, overlap) in [(80, 10), (120, 30), (200, 0), (57, 56)] {
        let chunks = split(&docs, size, overlap).expect("split");
        assert!(chunks.len() > 1, "size {size} should produce several windows");
        for c in &chunks {
            assert!(c.content.chars().count() <= size, "window exceeds chunk_size {size}");
            assert_eq!(c.total_chunks, chunks.len());
        }
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].content.chars().collect();
            let next: Vec<char> = pair[1].content.chars().collect();
            assert_eq!(&prev[prev.len() - overlap..], &next[..overlap], "neighbours share {overlap} chars");
            assert_eq!(pair[1].start, pair[0].end - overlap);
        }
        assert_eq!(Chunker::reassemble(&chunks), text, "lossless for size={size} overlap={overlap}");
    }
}

#[test]
fn paragraph_breaks_win_over_word_breaks() {
    let para_a = "a".repeat(30);
    let text = format!("{para_a}\n\nsecond paragraph with several words in it");
    let docs = vec![Document::new("p", text)];
    let chunks = split(&docs, 40, 5).expect("split");
    assert!(chunks[0].content.ends_with("\n\n"), "first window ends at the paragraph break: {:?}", chunks[0].content);
}

#[test]
fn multibyte_text_is_measured_in_characters() {
    let text = "naïve café résumé über straße ".repeat(8);
    let docs = vec![Document::new("u", text.clone())];
    let chunks = split(&docs, 25, 5).expect("split");
    for c in &chunks {
        assert!(c.char_len() <= 25);
        assert_eq!(c.content.chars().count(), c.char_len());
    }
    assert_eq!(Chunker::reassemble(&chunks), text);
}

#[test]
fn split_is_deterministic_and_keeps_document_order() {
    let docs = vec![
        Document::new("a", long_note()),
        Document::new("empty", "   "),
        Document::new("b", "Metformin 500mg BID"),
    ];
    let first = split(&docs, 100, 20).expect("split");
    let second = split(&docs, 100, 20).expect("split");
    assert_eq!(first, second);
    assert!(chunks_of(&first, "empty").is_empty(), "empty documents are dropped");
    assert_eq!(first.last().map(|c| c.doc_id.as_str()), Some("b"));
    assert_eq!(Chunker::reassemble(&chunks_of(&first, "a")), long_note());
}

#[test]
fn empty_corpus_is_an_error() {
    let docs = vec![Document::new("a", ""), Document::new("b", " \n ")];
    assert!(matches!(split(&docs, 100, 10), Err(Error::EmptyCorpus)));
    assert!(matches!(split(&[], 100, 10), Err(Error::EmptyCorpus)));
}

#[test]
fn invalid_chunking_parameters_are_rejected() {
    assert!(matches!(Chunker::new(ChunkingConfig { chunk_size: 0, chunk_overlap: 0 }), Err(Error::InvalidConfig(_))));
    assert!(matches!(Chunker::new(ChunkingConfig { chunk_size: 50, chunk_overlap: 50 }), Err(Error::InvalidConfig(_))));
    assert!(matches!(Chunker::new(ChunkingConfig { chunk_size: 50, chunk_overlap: 80 }), Err(Error::InvalidConfig(_))));
}

#[test]
fn json_records_become_documents_with_metadata() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ehr.json");
    fs::write(&path, r#"[{"type": "Lab", "content": "HbA1c 7.5%", "code": 4548}, {"type": "Note"}]"#).unwrap();

    let docs = load_documents(&path).expect("load");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].id, "ehr#1");
    assert_eq!(docs[0].content, "HbA1c 7.5%");
    assert_eq!(docs[0].metadata.get("type").map(String::as_str), Some("Lab"));
    assert_eq!(docs[0].metadata.get("code").map(String::as_str), Some("4548"));
    assert_eq!(docs[0].metadata.get("seq_num").map(String::as_str), Some("1"));
    assert!(docs[1].content.contains("Note"), "record without content is indexed as JSON");
}

#[test]
fn bare_string_records_are_supported() {
    let value = serde_json::json!(["first note", "second note"]);
    let docs = records_to_documents(&value, std::path::Path::new("/tmp/notes.json"));
    assert_eq!(docs.iter().map(|d| d.content.as_str()).collect::<Vec<_>>(), vec!["first note", "second note"]);
    assert_eq!(docs[1].id, "notes#2");
}

#[test]
fn directory_corpus_is_walked_in_name_order() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("labs")).unwrap();
    fs::write(dir.join("labs/b.txt"), "HbA1c 7.5% last month").unwrap();
    fs::write(dir.join("a.json"), r#"[{"content": "Metformin 500mg BID"}]"#).unwrap();
    fs::write(dir.join("ignored.md"), "not a corpus file").unwrap();

    let docs = load_documents(dir).expect("load");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].content, "Metformin 500mg BID");
    assert_eq!(docs[1].metadata.get("category").map(String::as_str), Some("labs"));
}

#[test]
fn mock_corpus_is_seeded_once() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data").join("ehr_mock.json");
    assert!(seed_mock_if_missing(&path).expect("seed"));
    assert!(!seed_mock_if_missing(&path).expect("seed again"));
    let docs = load_documents(&path).expect("load");
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[2].metadata.get("type").map(String::as_str), Some("Lab"));
}

#[test]
fn missing_corpus_path_is_reported() {
    let tmp = TempDir::new().unwrap();
    assert!(matches!(load_documents(&tmp.path().join("nope.json")), Err(Error::Corpus(_))));
}

#[test]
fn config_layers_file_and_env() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [rerank]
            top_k = 4

            [retrieval]
            normalization = "min_max"
            vector_weight = 0.25
            "#,
        )?;
        jail.set_env("CDSS_CHUNKING__CHUNK_SIZE", "200");
        let config = Config::load().map_err(|e| figment::Error::from(e.to_string()))?;
        let settings = config.settings().map_err(|e| figment::Error::from(e.to_string()))?;
        assert_eq!(settings.rerank.top_k, 4);
        assert_eq!(settings.chunking.chunk_size, 200);
        assert_eq!(settings.chunking.chunk_overlap, 50);
        assert_eq!(settings.retrieval.normalization, Normalization::MinMax);
        assert!((settings.retrieval.vector_weight - 0.25).abs() < f32::EPSILON);
        assert_eq!(config.get::<usize>("retrieval.lexical_k").map_err(|e| figment::Error::from(e.to_string()))?, 5);
        Ok(())
    });
}

#[test]
fn invalid_config_fails_to_load() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n")?;
        assert!(Config::load().is_err());
        Ok(())
    });
}

#[test]
fn settings_validation_never_clamps() {
    let mut settings = Settings::default();
    assert!(settings.validate().is_ok());
    settings.rerank.top_k = 0;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));

    let mut settings = Settings::default();
    settings.retrieval.lexical_weight = 0.0;
    settings.retrieval.vector_weight = 0.0;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));

    let mut settings = Settings::default();
    settings.retrieval.vector_weight = f32::NAN;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.embedding.fake_dim = 0;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
}
