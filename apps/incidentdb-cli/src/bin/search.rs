use std::env;

use incidentdb_core::config::{expand_path, Config};
use incidentdb_core::types::{ScoredIncident, TechStack};
use incidentdb_embed::get_default_embedder;
use incidentdb_retrieval::RetrievalEngine;
use incidentdb_store::SqliteIncidentStore;
use incidentdb_vector::LanceVectorIndex;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <query> [--stack java|python|nodejs] [--limit N]", args[0]);
        eprintln!(
            "Example: {} 'payment API timing out on PostgreSQL' --stack java --limit 8",
            args[0]
        );
        std::process::exit(1);
    }
    let query = &args[1];
    let mut current_stack: Option<TechStack> = None;
    let mut limit = 10usize;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--stack" => {
                let value = args.get(i + 1).ok_or_else(|| {
                    anyhow::anyhow!("--stack requires a value (java|python|nodejs)")
                })?;
                current_stack = Some(value.parse()?);
                i += 1;
            }
            "--limit" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow::anyhow!("--limit requires a number"))?;
                limit = value.parse()?;
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = Config::load()?;
    let backend = config.backend();
    let store = SqliteIncidentStore::open(&expand_path(&backend.sqlite_path))?;
    let index = LanceVectorIndex::open(&expand_path(&backend.lancedb_path), &backend.table_name)
        .await?;
    let embedder = get_default_embedder()?;
    let engine = RetrievalEngine::new(index, store, embedder);

    println!("🔍 incidentdb-search");
    println!("Query: {query}");
    println!(
        "Stack: {}",
        current_stack.map(|s| s.to_string()).unwrap_or_else(|| "any".to_string())
    );

    let result = engine.search(query, current_stack, limit).await?;
    if result.is_empty() {
        println!("\nNo similar incidents found (corpus may be empty).");
        return Ok(());
    }

    println!("\n🟢 SAME STACK ({}):", result.same_stack.len());
    print_partition(&result.same_stack);
    println!("\n🟡 CROSS-STACK ({}):", result.cross_stack.len());
    print_partition(&result.cross_stack);
    Ok(())
}

fn print_partition(incidents: &[ScoredIncident]) {
    for (i, scored) in incidents.iter().enumerate() {
        let inc = &scored.incident;
        println!(
            "\n  {}. {} [{}]  similarity={:.1}%",
            i + 1,
            inc.id,
            inc.tech_stack,
            scored.similarity_score * 100.0
        );
        println!("     {} (service: {})", inc.title, inc.service);
        println!("     Root cause: {}", inc.root_cause);
        if let Some(first_step) = inc.solution.first() {
            println!("     First step: {first_step}");
        }
    }
}
