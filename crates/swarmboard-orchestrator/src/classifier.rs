//! Task Router (C6): a pure, deterministic classifier that decides whether
//! incoming user text is answered directly or routed through the planner
//! pipeline. Signal words are data tables, not branches, so the ordered
//! rules stay easy to extend and each one is independently testable.

/// The two outcomes the router can produce for a piece of user text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    DirectAnswer,
    Pipeline,
}

const MULTI_STEP_MARKERS: &[&str] = &[
    "first,", "then ", "after that", "step 1", "step one", "finally,", "and then", "next,",
];

const ACTION_SIGNALS: &[&str] = &[
    "create", "build", "implement", "write", "fix", "refactor", "deploy", "run ", "install",
    "delete", "update", "generate", "migrate", "test ", "debug", "search", "fetch", "download",
];

const QUESTION_SIGNALS: &[&str] = &[
    "what is", "what's", "who is", "who's", "when is", "where is", "why is", "how do",
    "how does", "how is", "can you explain", "define ",
];

type Rule = fn(trimmed: &str, lower: &str) -> Option<Classification>;

/// Ordered rules, applied until one fires. Falling through every rule
/// routes to the pipeline, per the last-resort default.
const RULES: &[(&str, Rule)] = &[
    ("trivially_short", rule_trivially_short),
    ("multi_step_marker", rule_multi_step_marker),
    ("action_signal", rule_action_signal),
    ("question_signal", rule_question_signal),
    ("short_question_mark", rule_short_question_mark),
];

fn rule_trivially_short(trimmed: &str, _lower: &str) -> Option<Classification> {
    (trimmed.chars().count() < 5).then_some(Classification::DirectAnswer)
}

fn rule_multi_step_marker(_trimmed: &str, lower: &str) -> Option<Classification> {
    MULTI_STEP_MARKERS
        .iter()
        .any(|m| lower.contains(m))
        .then_some(Classification::Pipeline)
}

fn rule_action_signal(_trimmed: &str, lower: &str) -> Option<Classification> {
    ACTION_SIGNALS
        .iter()
        .any(|m| lower.contains(m))
        .then_some(Classification::Pipeline)
}

fn rule_question_signal(_trimmed: &str, lower: &str) -> Option<Classification> {
    QUESTION_SIGNALS
        .iter()
        .any(|m| lower.contains(m))
        .then_some(Classification::DirectAnswer)
}

fn rule_short_question_mark(trimmed: &str, _lower: &str) -> Option<Classification> {
    (trimmed.contains('?') && trimmed.chars().count() < 50).then_some(Classification::DirectAnswer)
}

/// Classifies one piece of user text by walking [`RULES`] in order and
/// returning the first rule's verdict, defaulting to [`Classification::Pipeline`]
/// if none fire.
pub fn classify(text: &str) -> Classification {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    for (_name, rule) in RULES {
        if let Some(c) = rule(trimmed, &lower) {
            return c;
        }
    }
    Classification::Pipeline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivially_short_text_is_direct_answer() {
        assert_eq!(classify("hi"), Classification::DirectAnswer);
        assert_eq!(classify("   ok "), Classification::DirectAnswer);
    }

    #[test]
    fn multi_step_marker_routes_to_pipeline() {
        assert_eq!(
            classify("First, read the config, then apply the changes"),
            Classification::Pipeline
        );
    }

    #[test]
    fn action_signal_routes_to_pipeline() {
        assert_eq!(
            classify("Implement a rate limiter for the API gateway"),
            Classification::Pipeline
        );
    }

    #[test]
    fn question_signal_is_direct_answer() {
        assert_eq!(
            classify("What is the capital of France"),
            Classification::DirectAnswer
        );
    }

    #[test]
    fn short_question_mark_is_direct_answer() {
        assert_eq!(classify("Is this thing on?"), Classification::DirectAnswer);
    }

    #[test]
    fn long_text_with_no_signals_falls_through_to_pipeline() {
        let text = "I have been thinking about this problem for a very long time now and I still don't know";
        assert_eq!(classify(text), Classification::Pipeline);
    }

    #[test]
    fn rule_order_matters_action_signal_beats_trailing_question_mark() {
        // Long text, contains both an action verb and a "?" past the
        // length-50 cutoff for rule_short_question_mark — action_signal
        // (an earlier rule) must win.
        let text = "Could you please build out a whole new authentication subsystem for us?";
        assert_eq!(classify(text), Classification::Pipeline);
    }
}
