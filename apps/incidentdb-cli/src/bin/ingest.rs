use std::env;
use std::path::PathBuf;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use incidentdb_core::config::{expand_path, Config};
use incidentdb_core::types::Incident;
use incidentdb_embed::get_default_embedder;
use incidentdb_retrieval::RetrievalEngine;
use incidentdb_store::SqliteIncidentStore;
use incidentdb_vector::LanceVectorIndex;

const BATCH_SIZE: usize = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let corpus_path = args
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/incidents.json"));

    let config = Config::load()?;
    let backend = config.backend();

    println!("📥 incidentdb-ingest");
    println!("Corpus: {}", corpus_path.display());
    println!("Store:  {}", backend.sqlite_path);
    println!("Index:  {} (table '{}')", backend.lancedb_path, backend.table_name);

    let raw = std::fs::read_to_string(&corpus_path)
        .with_context(|| format!("reading corpus {}", corpus_path.display()))?;
    let incidents: Vec<Incident> =
        serde_json::from_str(&raw).context("corpus is not a JSON array of incidents")?;
    println!("Loaded {} incidents", incidents.len());

    let store = SqliteIncidentStore::open(&expand_path(&backend.sqlite_path))?;
    let index = LanceVectorIndex::open(&expand_path(&backend.lancedb_path), &backend.table_name)
        .await?;
    let embedder = get_default_embedder()?;
    let engine = RetrievalEngine::new(index, store, embedder);

    let pb = ProgressBar::new(incidents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} incidents ({percent}%)")?
            .progress_chars("#>-"),
    );
    let mut ingested = 0usize;
    for batch in incidents.chunks(BATCH_SIZE) {
        ingested += engine.ingest(batch).await?;
        pb.set_position(ingested as u64);
    }
    pb.finish_with_message("done");

    println!("✅ Ingested {ingested} incidents (paired store rows + vectors)");
    Ok(())
}
