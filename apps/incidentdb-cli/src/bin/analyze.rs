use std::env;

use incidentdb_analyzer::{ChatClient, IncidentAnalyzer};
use incidentdb_core::config::{expand_path, Config};
use incidentdb_core::types::TechStack;
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
        eprintln!(
            "Usage: {} <description> --stack java|python|nodejs [--error <message>]",
            args[0]
        );
        std::process::exit(1);
    }
    let description = &args[1];
    let mut tech_stack: Option<TechStack> = None;
    let mut error_message: Option<String> = None;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--stack" => {
                let value = args.get(i + 1).ok_or_else(|| {
                    anyhow::anyhow!("--stack requires a value (java|python|nodejs)")
                })?;
                tech_stack = Some(value.parse()?);
                i += 1;
            }
            "--error" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow::anyhow!("--error requires a message"))?;
                error_message = Some(value.clone());
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                std::process::exit(1);
            }
        }
        i += 1;
    }
    let tech_stack =
        tech_stack.ok_or_else(|| anyhow::anyhow!("--stack is required for analysis"))?;

    let config = Config::load()?;
    let backend = config.backend();
    let store = SqliteIncidentStore::open(&expand_path(&backend.sqlite_path))?;
    let index = LanceVectorIndex::open(&expand_path(&backend.lancedb_path), &backend.table_name)
        .await?;
    let embedder = get_default_embedder()?;
    let engine = RetrievalEngine::new(index, store, embedder);
    let chat = ChatClient::from_env(&config.chat())?;
    let analyzer = IncidentAnalyzer::new(engine, chat);

    println!("🔍 incidentdb-analyze");
    println!("Stack: {tech_stack}");

    let analysis = analyzer
        .analyze(description, tech_stack, error_message.as_deref())
        .await?;

    println!("\n🎯 ROOT CAUSE\n{}", analysis.root_cause);
    println!("\n✅ SOLUTION");
    for (i, step) in analysis.solution_steps.iter().enumerate() {
        println!("  {}. {step}", i + 1);
    }
    println!("\n💡 REASONING\n{}", analysis.reasoning);

    if let Some(most_similar) = &analysis.most_similar {
        let inc = &most_similar.incident;
        println!(
            "\n🔗 Most similar incident: {} [{}] {} ({:.1}% match)",
            inc.id,
            inc.tech_stack,
            inc.title,
            most_similar.similarity_score * 100.0
        );
    }
    println!(
        "\n📊 {} same-stack | {} cross-stack incidents considered",
        analysis.same_stack.len(),
        analysis.cross_stack.len()
    );
    Ok(())
}
