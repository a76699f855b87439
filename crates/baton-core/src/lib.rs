//! baton-core: goal-conditioned session handoff engine
//!
//! Given the branch of a recorded coding session and a short goal for a
//! follow-up session, this crate builds a compact first-message prompt
//! that seeds the new session: index the branch into turns, pick anchor
//! turns under a token budget, extract operational highlights and file
//! lists, then run a two-pass extract/compose LLM pipeline over the
//! assembled material.

pub mod anchor;
pub mod budget;
pub mod bundle;
pub mod entry;
pub mod error;
pub mod handoff;
pub mod heuristics;
pub mod index;
pub mod operational;
pub mod pipeline;
pub mod prompts;
pub mod redact;
pub mod score;

pub use anchor::{Anchor, AnchorReason, build_turn_excerpt, select_anchors};
pub use budget::{HandoffBudgets, estimate_tokens, truncate_lines, truncate_to_tokens};
pub use entry::{SessionEntry, SummaryDetails, new_entry_id};
pub use error::{Error, Result};
pub use handoff::{
    HandoffOutcome, HandoffRequest, HandoffUi, NotifyLevel, SessionAccess, ensure_file_blocks,
    run_handoff,
};
pub use index::{BranchIndex, FileOperations, SummaryEntry, Turn, build_branch_index};
pub use operational::{FileLists, OperationalItem, collect_operational_items, file_lists};
pub use pipeline::{PassKind, PassOutcome, RetryConfig, run_pass, sleep_cancellable};
pub use score::{goal_tokens, score_turns};
