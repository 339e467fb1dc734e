use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use cdss_core::config::{Config, Settings};
use cdss_core::corpus::{load_documents, seed_mock_if_missing};
use cdss_core::{Chunk, Chunker};
use cdss_embed::{embedder_or_unavailable, scorer_or_unavailable};
use cdss_hybrid::Pipeline;

const USAGE: &str = "Usage: cdss <query|batch|chunks> [args...]
  query \"<question>\" [--top-k N]   retrieve and rerank evidence for one question
  batch <file> [--top-k N]           run every non-empty line of <file> concurrently
  chunks [--limit N]                 show how the corpus is chunked";

struct Args {
    cmd: String,
    positional: Vec<String>,
    top_k: Option<usize>,
    limit: Option<usize>,
    json: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = env::args().skip(1);
    let Some(cmd) = args.next() else { bail!("{USAGE}") };
    let mut parsed = Args { cmd, positional: Vec::new(), top_k: None, limit: None, json: false };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--top-k" | "-k" => parsed.top_k = Some(number(&arg, args.next())?),
            "--limit" => parsed.limit = Some(number(&arg, args.next())?),
            "--json" => parsed.json = true,
            "--help" | "-h" => bail!("{USAGE}"),
            _ if arg.starts_with('-') => bail!("unknown flag {arg}\n{USAGE}"),
            _ => parsed.positional.push(arg),
        }
    }
    Ok(parsed)
}

fn number(flag: &str, value: Option<String>) -> anyhow::Result<usize> {
    let value = value.with_context(|| format!("{flag} requires a number"))?;
    value.parse().with_context(|| format!("{flag} requires a number, got {value:?}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn base_dir() -> anyhow::Result<PathBuf> {
    env::current_dir().context("cannot determine working directory")
}

/// Build indexes over the configured corpus. A failed build is reported but
/// the pipeline is still returned; it answers every query with no evidence.
fn open_pipeline(settings: Settings) -> anyhow::Result<Arc<Pipeline>> {
    let embedder = embedder_or_unavailable(&settings.embedding);
    let scorer = scorer_or_unavailable(&settings.reranker);
    let pipeline = Pipeline::new(settings, embedder, scorer)?;
    match pipeline.build_from_corpus(&base_dir()?) {
        Ok(report) => {
            eprintln!(
                "📊 Indexed {} chunks from {} documents ({} embedded) in {} ms",
                report.chunks,
                report.documents,
                report.embedded,
                report.elapsed.as_millis()
            );
        }
        Err(e) => eprintln!("⚠️  Pipeline degraded: {e}"),
    }
    Ok(Arc::new(pipeline))
}

fn print_evidence(question: &str, evidence: &[Chunk], elapsed_ms: u128) {
    println!("\n🔍 {question}  ({} passages, {} ms)", evidence.len(), elapsed_ms);
    if evidence.is_empty() {
        println!("   no evidence found");
    }
    for (rank, chunk) in evidence.iter().enumerate() {
        let kind = chunk.metadata.get("type").map(String::as_str).unwrap_or("-");
        println!("{:>3}. [{}] ({}) {}", rank + 1, chunk.id, kind, chunk.content.trim());
    }
}

fn run_query(settings: Settings, args: &Args) -> anyhow::Result<()> {
    let question = args.positional.join(" ");
    if question.trim().is_empty() {
        bail!("query requires a question\n{USAGE}");
    }
    let top_k = args.top_k.unwrap_or(settings.rerank.top_k);
    let pipeline = open_pipeline(settings)?;
    let start = Instant::now();
    let evidence = pipeline.query_with(&question, top_k)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "question": question,
            "state": pipeline.state(),
            "degraded": pipeline.degraded(),
            "evidence": evidence,
        }))?);
    } else {
        print_evidence(&question, &evidence, start.elapsed().as_millis());
    }
    Ok(())
}

async fn answer_all(pipeline: Arc<Pipeline>, questions: Vec<String>, top_k: usize) -> anyhow::Result<Vec<(String, Vec<Chunk>, u128)>> {
    let tasks = questions.into_iter().map(|q| {
        let pipeline = pipeline.clone();
        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let evidence = pipeline.query_with(&q, top_k);
            (q, evidence, start.elapsed().as_millis())
        })
    });
    let mut out = Vec::new();
    for joined in futures::future::join_all(tasks).await {
        let (q, evidence, ms) = joined?;
        out.push((q, evidence?, ms));
    }
    Ok(out)
}

fn run_batch(settings: Settings, args: &Args) -> anyhow::Result<()> {
    let path = args.positional.first().context("batch requires a file of questions")?;
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let questions: Vec<String> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
    let top_k = args.top_k.unwrap_or(settings.rerank.top_k);
    let pipeline = open_pipeline(settings)?;

    let start = Instant::now();
    let rt = tokio::runtime::Runtime::new()?;
    let answers = rt.block_on(answer_all(pipeline, questions, top_k))?;
    for (q, evidence, ms) in &answers {
        print_evidence(q, evidence, *ms);
    }
    println!("\n✅ {} questions answered in {} ms", answers.len(), start.elapsed().as_millis());
    Ok(())
}

fn run_chunks(settings: &Settings, args: &Args) -> anyhow::Result<()> {
    let path = settings.corpus.resolved_path(&base_dir()?);
    if settings.corpus.seed_mock {
        seed_mock_if_missing(&path)?;
    }
    let documents = load_documents(&path)?;
    let chunks = Chunker::new(settings.chunking)?.split(&documents)?;
    println!("{} documents -> {} chunks from {}", documents.len(), chunks.len(), path.display());
    for chunk in chunks.iter().take(args.limit.unwrap_or(usize::MAX)) {
        let preview: String = chunk.content.chars().take(72).collect::<String>().replace('\n', " ");
        println!("{:<24} {:>6}..{:<6} {}", chunk.id, chunk.start, chunk.end, preview);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = parse_args()?;
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    match args.cmd.as_str() {
        "query" => run_query(settings, &args),
        "batch" => run_batch(settings, &args),
        "chunks" => run_chunks(&settings, &args),
        other => bail!("unknown command {other}\n{USAGE}"),
    }
}
