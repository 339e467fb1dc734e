use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use cdss_core::error::{Error, Result};
use cdss_core::traits::Retriever;
use cdss_core::types::{Chunk, RankedList, SourceKind};

use crate::tantivy_utils::{build_schema, register_analyzer, ID_FIELD, ORDINAL_FIELD, TEXT_FIELD};

const WRITER_HEAP_BYTES: usize = 50_000_000;

fn text_err(e: impl std::fmt::Display) -> Error {
	Error::retrieval(LexicalIndex::NAME, e)
}

/// BM25 retriever over an immutable chunk snapshot.
///
/// Every chunk is stored with its corpus ordinal so hits map back to the
/// snapshot and equal scores can be ordered by insertion.
pub struct LexicalIndex {
	chunks: Arc<[Chunk]>,
	index: Index,
	reader: IndexReader,
	text_field: Field,
	ordinal_field: Field,
}

impl LexicalIndex {
	pub const NAME: &'static str = "lexical";

	pub fn build(chunks: Arc<[Chunk]>) -> Result<Self> {
		let start = Instant::now();
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_analyzer(&index);
		let id_field = schema.get_field(ID_FIELD).map_err(text_err)?;
		let ordinal_field = schema.get_field(ORDINAL_FIELD).map_err(text_err)?;
		let text_field = schema.get_field(TEXT_FIELD).map_err(text_err)?;

		// One indexing thread keeps the snapshot in a single segment.
		let mut index_writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(text_err)?;
		for (ordinal, c) in chunks.iter().enumerate() {
			let doc = doc!(
				id_field => c.id.clone(),
				ordinal_field => ordinal as u64,
				text_field => c.content.clone(),
			);
			index_writer.add_document(doc).map_err(text_err)?;
		}
		index_writer.commit().map_err(text_err)?;

		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(text_err)?;
		info!(chunks = chunks.len(), elapsed_ms = start.elapsed().as_millis() as u64, "lexical index built");
		Ok(Self { chunks, index, reader, text_field, ordinal_field })
	}

	pub fn len(&self) -> usize {
		self.reader.searcher().num_docs() as usize
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Top `k` chunks by BM25. A query with no indexable term, or whose terms
	/// occur nowhere, yields an empty list.
	pub fn query(&self, text: &str, k: usize) -> Result<RankedList> {
		if k == 0 {
			return Err(Error::InvalidConfig("lexical k must be positive".into()));
		}
		let terms = self.query_terms(text)?;
		if terms.is_empty() {
			debug!("query has no indexable terms");
			return Ok(RankedList::empty());
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let q: Box<dyn Query> = Box::new(TermQuery::new(Term::from_field_text(self.text_field, t), IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		// Collect every match so ties at the cut-off resolve by ordinal, not by
		// collector order.
		let limit = self.chunks.len().max(1);
		let top_docs = searcher.search(&query, &TopDocs::with_limit(limit)).map_err(text_err)?;
		let mut scored = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(text_err)?;
			let ordinal = doc
				.get_first(self.ordinal_field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| text_err("stored document is missing its ordinal"))?;
			scored.push((ordinal as usize, score));
		}
		debug!(terms = terms.len(), matches = scored.len(), "lexical query");
		Ok(RankedList::from_scored(SourceKind::Text, &self.chunks, scored, k))
	}

	/// Run the query through the index analyzer; repeated terms count once.
	fn query_terms(&self, text: &str) -> Result<Vec<String>> {
		let mut analyzer = self.index.tokenizer_for_field(self.text_field).map_err(text_err)?;
		let mut stream = analyzer.token_stream(text);
		let mut terms = BTreeSet::new();
		while stream.advance() {
			terms.insert(stream.token().text.clone());
		}
		Ok(terms.into_iter().collect())
	}
}

impl Retriever for LexicalIndex {
	fn name(&self) -> &str {
		Self::NAME
	}

	fn retrieve(&self, query: &str, k: usize) -> Result<RankedList> {
		self.query(query, k)
	}
}
