use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const ID_FIELD: &str = "id";
pub const ORDINAL_FIELD: &str = "ordinal";
pub const TEXT_FIELD: &str = "text";
pub const CLINICAL_TOKENIZER: &str = "clinical_text";

/// Tokens longer than this (encoded blobs, run-together identifiers) are dropped.
const MAX_TOKEN_BYTES: usize = 40;

/// Function words that carry no evidence. Clinical abbreviations such as
/// "bid" or "prn" must never be listed here.
const STOP_WORDS: &[&str] = &[
	"a", "about", "an", "and", "any", "are", "as", "at", "be", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had",
	"has", "have", "having", "he", "her", "his", "how", "i", "if", "in", "is", "it", "its", "may", "me", "might", "must", "my", "not",
	"of", "on", "or", "our", "shall", "she", "should", "so", "than", "that", "the", "their", "them", "then", "there", "these", "they",
	"this", "to", "was", "we", "were", "what", "when", "where", "which", "who", "whom", "whose", "why", "will", "with", "would", "you",
	"your",
];

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(ID_FIELD, STRING | STORED);
	schema_builder.add_u64_field(ORDINAL_FIELD, STORED);
	// BM25 needs term frequencies and field norms, not positions.
	let indexing = TextFieldIndexing::default().set_tokenizer(CLINICAL_TOKENIZER).set_index_option(IndexRecordOption::WithFreqs);
	schema_builder.add_text_field(TEXT_FIELD, TextOptions::default().set_indexing_options(indexing));
	schema_builder.build()
}

/// Analyzer shared by indexing and querying: split on non-alphanumerics,
/// drop over-long tokens, lowercase, remove stop words.
pub fn clinical_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|w| w.to_string())))
		.build()
}

pub fn register_analyzer(index: &Index) {
	index.tokenizers().register(CLINICAL_TOKENIZER, clinical_analyzer());
}
