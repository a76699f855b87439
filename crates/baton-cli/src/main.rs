//! baton - goal-conditioned session handoff for coding agents

mod chat;
mod commands;
mod config;
mod heuristics;
mod session;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use baton_ai::{Api, HttpCompletionClient, Model, Provider};
use clap::Parser;

/// baton - carry a coding session forward under a new goal
#[derive(Parser, Debug)]
#[command(name = "baton")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: claude-sonnet-4-5-20250929)
    #[arg(short, long, default_value = "claude-sonnet-4-5-20250929")]
    model: String,

    /// Provider (anthropic, openai)
    #[arg(short, long, default_value = "anthropic")]
    provider: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Resume a previous session by ID
    #[arg(long)]
    resume: Option<String>,

    /// List saved sessions
    #[arg(long)]
    sessions: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Run the offline heuristics analysis instead of the chat shell
    #[arg(long)]
    heuristics: bool,

    /// Sessions directory override (heuristics mode)
    #[arg(long)]
    sessions_dir: Option<PathBuf>,

    /// Output directory for heuristics artifacts
    #[arg(long, default_value = "heuristics-out")]
    out_dir: PathBuf,
}

fn get_model(provider: &str, model_id: &str) -> Model {
    let (api, provider_enum, base_url, context_window, max_tokens) = match provider {
        "openai" => (
            Api::OpenAICompletions,
            Provider::OpenAI,
            "https://api.openai.com/v1".to_string(),
            128000,
            16384,
        ),
        _ => (
            Api::AnthropicMessages,
            Provider::Anthropic,
            "https://api.anthropic.com".to_string(),
            200000,
            64000,
        ),
    };

    Model {
        id: model_id.to_string(),
        name: model_id.to_string(),
        api,
        provider: provider_enum,
        base_url,
        context_window,
        max_tokens,
        headers: Default::default(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("baton=debug")
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // List sessions and exit
    if args.sessions {
        return list_sessions();
    }

    // Offline heuristics mode
    if args.heuristics {
        return heuristics::run(args.sessions_dir, &args.out_dir);
    }

    // Load config; CLI args take precedence over config values
    let cfg = config::Config::load();

    let provider = if args.provider != "anthropic" {
        args.provider.clone()
    } else {
        cfg.provider.clone().unwrap_or_else(|| args.provider.clone())
    };

    let model_id = if args.model != "claude-sonnet-4-5-20250929" {
        args.model.clone()
    } else {
        cfg.model.clone().unwrap_or_else(|| args.model.clone())
    };

    let model = get_model(&provider, &model_id);

    let Some(api_key) = cfg.get_api_key(&provider) else {
        let api_key_var = model.provider.api_key_env_var().unwrap_or("ANTHROPIC_API_KEY");
        eprintln!("Error: No API key found for {}", provider);
        eprintln!();
        eprintln!("Set your API key with: export {}=your-key", api_key_var);
        eprintln!("Or add it to the config file: baton --init-config");
        std::process::exit(1);
    };

    if !ui::is_interactive() {
        eprintln!("Error: baton requires an interactive terminal");
        std::process::exit(1);
    }

    // Resume or start a session
    let store = match args.resume {
        Some(ref session_id) => match session::SessionStore::load(session_id) {
            Ok(store) => {
                println!(
                    "Resuming session {} ({} messages)",
                    session_id,
                    store.messages().len()
                );
                store
            }
            Err(e) => {
                eprintln!("Error loading session: {}", e);
                std::process::exit(1);
            }
        },
        None => session::SessionStore::create(&model.id, None)?,
    };

    let ctx = chat::ChatContext {
        client: Arc::new(HttpCompletionClient::new()),
        model,
        api_key: Some(api_key),
        editor: cfg.editor.clone(),
    };

    chat::run_chat(store, ctx).await
}

fn list_sessions() -> anyhow::Result<()> {
    match session::SessionStore::list_sessions() {
        Ok(sessions) => {
            if sessions.is_empty() {
                println!("No saved sessions found.");
                println!(
                    "Sessions are stored in: {}",
                    session::SessionStore::sessions_dir().display()
                );
            } else {
                println!("Saved sessions:\n");
                println!("{:<38} {:<20} {:<8} {:<8} Working Dir", "ID", "Created", "Msgs", "Child");
                println!("{}", "-".repeat(96));
                for s in sessions {
                    println!(
                        "{:<38} {:<20} {:<8} {:<8} {}",
                        s.id,
                        s.created_at_display(),
                        s.message_count,
                        if s.parent_session.is_some() { "yes" } else { "" },
                        s.working_dir
                    );
                }
                println!("\nResume with: baton --resume <session-id>");
            }
        }
        Err(e) => {
            eprintln!("Error listing sessions: {}", e);
        }
    }
    Ok(())
}
