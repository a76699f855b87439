//! /handoff command - build a handoff prompt and seed a child session

use baton_ai::{CompletionClient, Model};
use baton_core::{
    HandoffBudgets, HandoffOutcome, HandoffRequest, HandoffUi, NotifyLevel, RetryConfig,
    SessionAccess, run_handoff,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::session::SessionStore;
use crate::ui::{TerminalUi, run_with_ctrl_c};

/// Custom-entry type carrying a not-yet-submitted seed prompt.
pub const SEED_PROMPT_TYPE: &str = "seed_prompt";

/// Everything the handoff command needs beyond the session itself
pub struct HandoffDeps<'a> {
    pub client: &'a dyn CompletionClient,
    pub model: &'a Model,
    pub api_key: Option<String>,
    pub editor: Option<String>,
}

/// Execute `/handoff <goal>` against the current session.
pub async fn run(goal: &str, store: &mut SessionStore, deps: &HandoffDeps<'_>) {
    let ui = TerminalUi::new(deps.editor.clone());

    let goal = goal.trim();
    if goal.is_empty() {
        ui.notify("Usage: /handoff <goal>", NotifyLevel::Error);
        return;
    }

    ui.notify(
        "Building handoff packet... (ctrl-c to cancel)",
        NotifyLevel::Info,
    );

    let request = HandoffRequest {
        goal: goal.to_string(),
        model: deps.model,
        api_key: deps.api_key.clone(),
        budgets: HandoffBudgets::default(),
        retry: RetryConfig::default(),
    };

    let cancel = CancellationToken::new();
    let child_id: Mutex<Option<String>> = Mutex::new(None);
    let model_id = deps.model.id.clone();

    let result = run_with_ctrl_c(
        &cancel,
        run_handoff(request, store, &ui, deps.client, &cancel, |parent, prompt| {
            let mut child = SessionStore::create(&model_id, Some(parent))?;
            child.append_custom(
                SEED_PROMPT_TYPE,
                serde_json::json!({ "prompt": prompt }),
            )?;
            *child_id.lock() = Some(child.id().to_string());
            Ok(true)
        }),
    )
    .await;

    match result {
        Ok(HandoffOutcome::Completed { .. }) => {
            let child_id = child_id.lock();
            if let Some(id) = child_id.as_deref() {
                ui.notify(
                    &format!(
                        "Handoff session created: {}\nResume it with: baton --resume {}",
                        id, id
                    ),
                    NotifyLevel::Info,
                );
            }
        }
        Ok(HandoffOutcome::Cancelled) => {
            ui.notify("Cancelled", NotifyLevel::Info);
        }
        Err(e) => {
            ui.notify(&e.friendly_message(), NotifyLevel::Error);
        }
    }
}
