//! Interactive chat shell
//!
//! A thin prompt/completion loop over the session store: enough surface
//! for `/handoff` to have a live session to work against. No tool
//! execution happens here; tool calls and results arrive in sessions
//! recorded by richer frontends.

use std::io::{self, Write};
use std::sync::Arc;

use baton_ai::{CompleteOptions, CompletionClient, Context, Message, Model};
use baton_core::SessionEntry;
use tokio_util::sync::CancellationToken;

use crate::commands::{self, CommandResult, handoff::HandoffDeps};
use crate::session::SessionStore;
use crate::ui::run_with_ctrl_c;

const CHAT_SYSTEM_PROMPT: &str = "You are a concise coding assistant.";

/// Shared pieces of the chat shell
pub struct ChatContext {
    pub client: Arc<dyn CompletionClient>,
    pub model: Model,
    pub api_key: Option<String>,
    pub editor: Option<String>,
}

/// Run the interactive loop until EOF or `/quit`.
pub async fn run_chat(mut store: SessionStore, ctx: ChatContext) -> anyhow::Result<()> {
    let model_short = ctx.model.id.split('/').next_back().unwrap_or(&ctx.model.id);
    eprintln!("baton ({}) session: {}", model_short, &store.id()[..8.min(store.id().len())]);

    // A handoff may have left a draft prompt to start from
    let mut draft = take_seed_prompt(&store);
    if let Some(ref prompt) = draft {
        println!("\nDraft prompt from handoff:\n\n{}\n", prompt);
        println!("Press Enter to send it, or type a different message.");
    }
    eprintln!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            match draft.take() {
                Some(prompt) => send(&mut store, &ctx, &prompt).await?,
                None => continue,
            }
            println!();
            continue;
        }

        if let Some(result) = commands::execute_command(input) {
            match result {
                CommandResult::Message(msg) => println!("{}", msg),
                CommandResult::SessionInfo => {
                    println!("{}", commands::session_info_message(&store, &ctx.model));
                }
                CommandResult::Handoff(goal) => {
                    let deps = HandoffDeps {
                        client: ctx.client.as_ref(),
                        model: &ctx.model,
                        api_key: ctx.api_key.clone(),
                        editor: ctx.editor.clone(),
                    };
                    commands::handoff::run(&goal, &mut store, &deps).await;
                }
                CommandResult::Clear => {
                    store = SessionStore::create(&ctx.model.id, None)?;
                    draft = None;
                    println!("Started fresh session {}", store.id());
                }
                CommandResult::Exit => break,
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        draft = None;
        send(&mut store, &ctx, input).await?;
        println!();
    }

    Ok(())
}

/// Send one user message and record the exchange.
async fn send(store: &mut SessionStore, ctx: &ChatContext, text: &str) -> anyhow::Result<()> {
    let user_message = Message::user(text);
    store.append_message(&user_message)?;

    let context = Context {
        system_prompt: Some(CHAT_SYSTEM_PROMPT.to_string()),
        messages: store.messages(),
    };
    let options = CompleteOptions {
        api_key: ctx.api_key.clone(),
        max_tokens: None,
        temperature: None,
    };

    let cancel = CancellationToken::new();
    let result = run_with_ctrl_c(
        &cancel,
        ctx.client
            .complete(&ctx.model, &context, &options, cancel.clone()),
    )
    .await;

    match result {
        Ok(message) => {
            let text = message.text();
            if !text.is_empty() {
                println!("{}", text);
            }
            store.append_message(&message)?;
        }
        Err(baton_ai::Error::Aborted) => {
            println!("Cancelled");
        }
        Err(e) => {
            eprintln!("Error: {}", e.friendly_message());
        }
    }

    Ok(())
}

/// Pop the trailing seed prompt left by a handoff, if any.
fn take_seed_prompt(store: &SessionStore) -> Option<String> {
    let last = store.entries().last()?;
    match last {
        SessionEntry::Custom {
            custom_type, data, ..
        } if custom_type == commands::handoff::SEED_PROMPT_TYPE => data
            .get("prompt")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}
