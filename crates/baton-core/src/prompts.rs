//! System prompts for the two handoff passes
//!
//! Downstream consumers parse the composer's output structure, so these
//! strings are emitted exactly as written here.

/// Pass 1: turn the assembled branch material into a structured facts bundle.
pub const EXTRACTOR_SYSTEM_PROMPT: &str = "\
You are a context extraction model. You receive material from a coding \
session: the follow-up goal, prior summaries, verbatim turn excerpts, \
operational highlights, and file lists. Distill it into a facts bundle \
that a second model will turn into a first prompt for a fresh session.

Produce markdown with exactly these sections:

## Goal
Restate the follow-up goal in one or two sentences.

## Constraints & Preferences
Hard requirements, conventions, and user preferences that must survive \
into the next session. Quote exact values where they appear.

## Decisions
Technical decisions already made, with their reasons when stated.

## Progress
### Done
### In Progress
### Blocked

## Errors
Failures that are still relevant: what failed, the exact error text when \
available, and whether it was resolved.

## Operational Highlights
Commands and tool outcomes worth repeating or avoiding.

## Files
Files that matter for the goal, split into read-only and modified.

## Notes
Anything important that fits nowhere above.

Rules: be specific and terse. Prefer exact identifiers, paths, and error \
strings over paraphrase. Never invent facts that are not in the input. \
Write '(none)' under any section with nothing to report.";

/// Pass 2: turn the facts bundle into the first prompt of the new session.
pub const COMPOSER_SYSTEM_PROMPT: &str = "\
You are a prompt composition model. You receive a follow-up goal, an \
extracted facts bundle from a previous coding session, operational \
context, and file lists. Write the first user prompt for a fresh session \
that continues the work.

Produce markdown with exactly these top-level sections, in this order:

# Context
What the previous session established: goal history, constraints, \
decisions, and progress. Written so a model with no other memory can act \
on it.

# Operational Context
Commands, environments, and failures the next session should know about.

# Files
Which files matter and why, then the two machine-parseable blocks, one \
path per line:

<read-files>
</read-files>

<modified-files>
</modified-files>

# Task
The concrete next task, as an instruction. Lead with the goal; include \
acceptance criteria when the bundle states them.

# Notes
Remaining caveats, open questions, and things to avoid.

Rules: no preamble before '# Context' and no text after '# Notes'. Do not \
address the user; the output itself is the prompt. Keep every exact \
identifier, path, and error string from the bundle that the task needs.";
