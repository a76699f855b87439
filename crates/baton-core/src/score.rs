//! Goal scoring: how strongly each turn relates to the follow-up goal

use crate::index::{BranchIndex, Turn};

/// Split a goal into lowercase match tokens.
///
/// Tokens keep word characters plus `_ . / -` so file paths and
/// identifiers survive; fragments shorter than three characters are noise
/// and dropped.
pub fn goal_tokens(goal: &str) -> Vec<String> {
    goal.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '/' | '-')))
        .filter(|token| token.len() >= 3)
        .map(str::to_string)
        .collect()
}

/// Score one turn against the goal.
///
/// Longer token matches weigh more; a goal that names one of the turn's
/// file paths outright weighs most. Returns 0 when the goal has no usable
/// tokens.
pub fn score_turn(turn: &Turn, goal_lower: &str, tokens: &[String]) -> i64 {
    if tokens.is_empty() {
        return 0;
    }

    let mut score = 0i64;

    for token in tokens {
        if turn.search_text.contains(token.as_str()) {
            score += if token.len() > 4 { 2 } else { 1 };
        }
    }

    for path in &turn.file_paths {
        let path_lower = path.to_lowercase();
        if goal_lower.contains(&path_lower) {
            score += 3;
        }
        for token in tokens {
            if path_lower.contains(token.as_str()) {
                score += 1;
            }
        }
    }

    score
}

/// Score every turn in the index in place.
pub fn score_turns(index: &mut BranchIndex, goal: &str) {
    let goal_lower = goal.to_lowercase();
    let tokens = goal_tokens(goal);
    for turn in &mut index.turns {
        turn.goal_score = score_turn(turn, &goal_lower, &tokens);
    }
}
