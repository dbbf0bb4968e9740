use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::agents::HotelAgent;
use crate::catalog::{import_rooms_file, RoomFilter, RoomStore};
use crate::config::Config;
use crate::embeddings::EmbeddingService;
use crate::search::{SearchRequest, VectorSearchEngine};
use crate::sessions::SessionStore;

#[derive(Parser)]
#[command(name = "hotelchat", version, about = "Conversational hotel room search")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat with the hotel assistant
    Chat(ChatOpts),
    /// Ask the assistant a single question
    Ask(AskOpts),
    /// Search the room catalog directly
    Search(SearchOpts),
    /// Import rooms from a JSON or YAML file into the catalog
    Load(LoadOpts),
    Config(ConfigOpts),
    Version,
}

#[derive(clap::Args)]
pub struct ChatOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(short, long, default_value = "main")]
    pub session_key: String,
}

#[derive(clap::Args)]
pub struct AskOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    pub message: String,
}

#[derive(clap::Args)]
pub struct SearchOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    pub query: String,
    #[arg(short, long)]
    pub k: Option<usize>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub max_price: Option<f64>,
    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct LoadOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(default_value = "data/rooms.json")]
    pub file: PathBuf,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}

// ============================================================================
// Wiring
// ============================================================================

/// Open the configured room catalog.
pub fn open_catalog(config: &Config) -> Result<RoomStore> {
    let embedder = EmbeddingService::from_config(&config.embedding);
    let path = config.catalog_path();
    RoomStore::open(&path, embedder, config.catalog.metric)
        .with_context(|| format!("failed to open room catalog {}", path.display()))
}

pub fn build_engine(config: &Config) -> Result<VectorSearchEngine> {
    Ok(VectorSearchEngine::new(open_catalog(config)?, &config.search))
}

fn build_agent(config: &Config) -> Result<Arc<HotelAgent>> {
    let engine = build_engine(config)?;
    if engine.store().is_empty()? {
        warn!(
            catalog = %config.catalog_path().display(),
            "room catalog is empty, run `hotelchat load` to import rooms"
        );
    }
    Ok(Arc::new(HotelAgent::from_config(config, engine)?))
}

// ============================================================================
// Commands
// ============================================================================

pub async fn run_search(config: &Config, opts: &SearchOpts) -> Result<()> {
    let engine = build_engine(config)?;
    let request = SearchRequest {
        query: opts.query.clone(),
        k: opts.k,
        filter: RoomFilter {
            city: opts.city.clone(),
            max_price: opts.max_price,
        },
    };
    let results = engine.search_with(request).await?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("{}", crate::agents::tools::NO_RESULTS_MARKER);
    }
    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({}) ${:.2}/night",
            i + 1,
            r.score,
            r.room.name,
            r.room.city,
            r.room.price
        );
    }
    Ok(())
}

pub async fn run_load(config: &Config, opts: &LoadOpts) -> Result<()> {
    let store = open_catalog(config)?;
    let count = import_rooms_file(&store, &opts.file).await?;
    println!(
        "Imported {} rooms into {} ({} total)",
        count,
        config.catalog_path().display(),
        store.len()?
    );
    Ok(())
}

pub async fn run_ask(config: &Config, message: &str) -> Result<()> {
    let sessions = SessionStore::new(build_agent(config)?);
    let reply = sessions.chat("ask", message).await;
    println!("{reply}");
    Ok(())
}

/// Interactive loop on stdin until EOF or an exit command.
pub async fn run_chat(config: &Config, opts: &ChatOpts) -> Result<()> {
    let sessions = SessionStore::new(build_agent(config)?);
    let session = sessions.get_or_create_session(&opts.session_key);
    info!(session_key = %opts.session_key, "chat session started");

    println!("Hotel assistant ready. Type 'reset' to start over, 'quit' to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Exit => break,
            ChatInput::Reset => {
                session.reset().await;
                println!("Conversation cleared.");
            }
            ChatInput::Message(text) => {
                let reply = session.chat(text).await;
                println!("Assistant: {reply}");
            }
        }
    }
    println!("Goodbye!");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Empty,
    Exit,
    Reset,
    Message(&'a str),
}

fn parse_input(line: &str) -> ChatInput<'_> {
    let text = line.trim();
    match text.to_lowercase().as_str() {
        "" => ChatInput::Empty,
        "quit" | "exit" | "bye" | "/quit" | "/exit" => ChatInput::Exit,
        "reset" | "/reset" => ChatInput::Reset,
        _ => ChatInput::Message(text),
    }
}
