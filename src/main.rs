mod augment;
mod client;
mod config;
mod extract;
mod history;
mod minion;
mod ollama;
mod progress;
mod protocol;
mod relevance;
mod retrieval;
mod search;
mod transcript;

use std::sync::Arc;
use tokio::sync::mpsc;

use augment::SearchAugmentedClient;
use client::ChatClient;
use minion::{Minion, MinionConfig};
use ollama::OllamaClient;
use retrieval::{RetrievalPipeline, SearchCache};
use search::WebSearchProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: tandem <task...>");
        eprintln!("       tandem --history");
        eprintln!();
        eprintln!("Runs a Worker/Supervisor conversation for the given task.");
        eprintln!("Extra context can be provided via the TANDEM_CONTEXT env var.");
        std::process::exit(2);
    }

    if args[0] == "--history" {
        for entry in history::list_runs(10)? {
            println!("#{} {}", entry.id, entry.task);
            println!("    {}", entry.final_answer.lines().next().unwrap_or(""));
        }
        return Ok(());
    }

    let task = args.join(" ");
    let context = std::env::var("TANDEM_CONTEXT").unwrap_or_default();

    let config = config::Config::load();
    if let Err(e) = history::init() {
        eprintln!("Warning: could not initialize run history: {}", e);
    }

    // Progress events print as they arrive; the conversation itself stays
    // free of display concerns.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                progress::Event::ConversationStarted => println!("[tandem] conversation started"),
                progress::Event::SearchStarted(query) => println!("[tandem] searching: {}", query),
                progress::Event::SearchCompleted { query, documents } => {
                    println!("[tandem] search \"{}\" -> {} document(s)", query, documents)
                }
                progress::Event::UrlFetched { url, ok } => {
                    println!("[tandem] fetched {} ({})", url, if ok { "ok" } else { "skipped" })
                }
                progress::Event::TurnCompleted { role } => println!("[tandem] {} turn complete", role),
                progress::Event::RoundCompleted(round) => println!("[tandem] round {} complete", round + 1),
                progress::Event::FinalAnswer => println!("[tandem] final answer ready"),
            }
        }
    });

    let cache = Arc::new(SearchCache::new());
    let provider = WebSearchProvider::new(config.search.endpoint.clone(), config.search.api_key.clone());
    let mut pipeline = RetrievalPipeline::new(Box::new(provider), cache, config.search.max_results);
    pipeline.set_progress_channel(tx.clone());
    let pipeline = Arc::new(pipeline);

    let worker_base: Arc<dyn ChatClient> = Arc::new(OllamaClient::with_config(
        config.worker.host.clone(),
        config.worker.model.clone(),
    ));
    // Search is a side effect of message content: only the decorator ever
    // talks to the retrieval pipeline.
    let worker: Arc<dyn ChatClient> = Arc::new(SearchAugmentedClient::new(worker_base, pipeline));
    let supervisor: Arc<dyn ChatClient> = Arc::new(OllamaClient::with_config(
        config.supervisor.host.clone(),
        config.supervisor.model.clone(),
    ));

    let mut minion = Minion::new(
        worker,
        supervisor,
        MinionConfig {
            max_rounds: config.conversation.max_rounds,
            enable_followups: config.conversation.enable_followups,
            privacy_shield: config.conversation.privacy_shield,
            log_dir: config.log_dir(),
            logging_id: None,
        },
    );
    minion.set_progress_channel(tx);

    let output = minion.run(&task, &context).await;

    println!();
    println!("=== Final answer ===");
    println!("{}", output.final_answer);
    println!();
    println!(
        "Worker usage: {} prompt + {} completion tokens",
        output.local_usage.prompt_tokens, output.local_usage.completion_tokens
    );
    println!(
        "Supervisor usage: {} prompt + {} completion tokens",
        output.remote_usage.prompt_tokens, output.remote_usage.completion_tokens
    );
    if let Some(path) = &output.log_path {
        println!("Conversation log: {}", path.display());
    }

    if let Err(e) = history::add_run(&task, &output.final_answer) {
        eprintln!("Warning: could not record run history: {}", e);
    }

    if std::env::var("TANDEM_DEBUG").is_ok() {
        println!("--- verbose log ---");
        for entry in progress::recent(50) {
            println!("[{:?}] {}", entry.kind, entry.text);
        }
    }

    printer.abort();
    Ok(())
}
