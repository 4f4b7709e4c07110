use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use slide_common::{export_filename, write_in_dir, SlideConfig};
use slide_core::ingest::load_source_text;
use slide_core::{
    DeckRenderer, ModelClient, OpenAiAdapter, SessionStore, SlideOrchestrator, StubClient,
};
use slide_protocol::{EditRequest, GenerateRequest, SessionId, SlideDeck};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "slide")]
#[command(about = "Generate, edit and version slide decks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Override model (e.g., gpt-4o, gpt-4o-mini)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Use the built-in offline model instead of the API
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new deck and open a session for it
    Generate {
        #[arg(short, long)]
        prompt: String,
        /// Source document (.txt or .md)
        #[arg(short, long)]
        document: Option<PathBuf>,
        #[arg(short, long)]
        theme: Option<String>,
    },
    /// Edit a session's deck with a prompt
    Edit {
        #[arg(short, long)]
        session: String,
        #[arg(short, long)]
        prompt: String,
        /// Hand-edited deck (JSON) to use as the starting point
        #[arg(long)]
        external: Option<PathBuf>,
    },
    /// Revert the last change in a session
    Undo {
        #[arg(short, long)]
        session: String,
    },
    /// Write the current deck as markdown
    Export {
        #[arg(short, long)]
        session: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List sessions
    Sessions,
    /// Delete a session
    Delete {
        #[arg(short, long)]
        session: String,
    },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = SlideConfig::load().await?;
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }

    let client: Arc<dyn ModelClient> = if cli.offline {
        tracing::info!("using offline model");
        Arc::new(StubClient)
    } else {
        Arc::new(OpenAiAdapter::from_config(&config)?)
    };

    let state_dir = config.state_dir.clone();
    let store = Arc::new(SessionStore::new());
    store.load_snapshots(&state_dir).await?;
    for id in store
        .evict_expired(Duration::from_secs(config.session_ttl_secs))
        .await
    {
        SessionStore::remove_snapshot(&id, &state_dir).await?;
    }

    let orchestrator = SlideOrchestrator::new(client, &config).with_store(Arc::clone(&store));
    run_command(cli.command, &orchestrator, &state_dir).await
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_command(command: Commands, orchestrator: &SlideOrchestrator, state_dir: &Path) -> Result<()> {
    let store = orchestrator.store();
    match command {
        Commands::Generate { prompt, document, theme } => {
            let document = match document {
                Some(path) => Some(load_source_text(&path).await?),
                None => None,
            };
            let response = orchestrator
                .generate(GenerateRequest { prompt, document, theme })
                .await?;
            store.save_snapshot(&response.session_id, state_dir).await?;

            println!("{}", response.message);
            println!("session: {}", response.session_id);
            print_deck(&response.deck);
        }
        Commands::Edit { session, prompt, external } => {
            let session_id = SessionId::from(session);
            let external_deck = match external {
                Some(path) => Some(read_external_deck(&path).await?),
                None => None,
            };
            let deck = orchestrator
                .edit(EditRequest { session_id: session_id.clone(), prompt, external_deck })
                .await?;
            store.save_snapshot(&session_id, state_dir).await?;
            print_deck(&deck);
        }
        Commands::Undo { session } => {
            let session_id = SessionId::from(session);
            let outcome = orchestrator.undo(&session_id).await?;
            if outcome.undone {
                store.save_snapshot(&session_id, state_dir).await?;
                println!("Reverted last change");
            } else {
                println!("Nothing to undo");
            }
            print_deck(&outcome.deck);
        }
        Commands::Export { session, output } => {
            let session_id = SessionId::from(session);
            let bytes = orchestrator.export(&session_id).await?;
            store.save_snapshot(&session_id, state_dir).await?;
            let path = match output {
                Some(path) => {
                    tokio::fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    path
                }
                None => {
                    let theme = store.snapshot(&session_id).await?.theme;
                    let filename = default_export_name(theme.as_deref(), orchestrator.renderer());
                    write_in_dir(".", &filename, &bytes).await?
                }
            };
            println!("Exported to {}", path.display());
        }
        Commands::Sessions => {
            let sessions = orchestrator.sessions().await;
            if sessions.is_empty() {
                println!("No sessions");
            }
            for info in sessions {
                println!(
                    "{}  {} slides  {} snapshots  created {}{}",
                    info.session_id,
                    info.total_slides,
                    info.history_len,
                    info.created_at.format("%Y-%m-%d %H:%M"),
                    if info.has_source_document { "  (with document)" } else { "" }
                );
            }
        }
        Commands::Delete { session } => {
            let session_id = SessionId::from(session);
            orchestrator.delete_session(&session_id).await?;
            SessionStore::remove_snapshot(&session_id, state_dir).await?;
            println!("Deleted session {session_id}");
        }
    }
    Ok(())
}

async fn read_external_deck(path: &Path) -> Result<SlideDeck> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let deck = serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not a JSON slide list", path.display()))?;
    Ok(deck)
}

/// File name for an export written without `--output`.
fn default_export_name(theme: Option<&str>, renderer: &dyn DeckRenderer) -> String {
    export_filename(theme.unwrap_or_default(), renderer.extension())
}

fn print_deck(deck: &SlideDeck) {
    for slide in deck {
        println!("{:>3}. {}", slide.number, slide.title);
    }
}
