#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeSet;
use swarmboard_core::*;

// ---------------------------------------------------------------------------
// 1. Task lifecycle invariants: ownership, inheritance, readiness
// ---------------------------------------------------------------------------

#[test]
fn task_ownership_and_child_inheritance() {
    let root = Task::new_root(
        "root-1",
        "ship the release notes",
        Some("planner".into()),
        Complexity::Complex,
        Source::new("please ship the release notes"),
    );
    assert!(root.agent_ownership_invariant_holds());

    let mut blockers = BTreeSet::new();
    blockers.insert("root-1-draft".to_string());
    let child = Task::child_of(
        &root,
        "root-1-review",
        SubTaskSpec {
            objective: "review the draft".into(),
            constraints: vec![],
            input: Default::default(),
            output_format: OutputFormat::Text,
            tool_hint: vec![],
            complexity: Complexity::Normal,
            parent_intent: root.description.clone(),
            a2a_hint: None,
        }
        .to_description(),
        Some("review".into()),
        Complexity::Normal,
        blockers.clone(),
    );

    assert_eq!(child.parent_id.as_deref(), Some("root-1"));
    assert_eq!(child.source.original_text, root.source.original_text);
    assert_eq!(child.blocked_by, blockers);
    assert!(!child.is_ready(&BTreeSet::new()));
}

// ---------------------------------------------------------------------------
// 2. SubTaskSpec round-trips through a task description, modern and legacy
// ---------------------------------------------------------------------------

#[test]
fn subtask_spec_roundtrip_and_role_inference() {
    let spec = SubTaskSpec {
        objective: "audit the migration script".into(),
        constraints: vec!["no destructive DDL".into()],
        input: Default::default(),
        output_format: OutputFormat::MarkdownTable,
        tool_hint: vec!["filesystem".into()],
        complexity: Complexity::Complex,
        parent_intent: "migrate the schema".into(),
        a2a_hint: None,
    };
    let description = spec.to_description();
    let parsed = SubTaskSpec::parse(&description, "unused").expect("modern spec parses");
    assert_eq!(parsed.objective, spec.objective);
    assert_eq!(
        SubTaskSpec::infer_required_role(&parsed.objective),
        "review"
    );

    let legacy = "TASK: implement the retry loop\nCOMPLEXITY: normal\n";
    let parsed_legacy = SubTaskSpec::parse(legacy, "ship v2").expect("legacy spec parses");
    assert_eq!(parsed_legacy.objective, "implement the retry loop");
    assert_eq!(parsed_legacy.parent_intent, "ship v2");
    assert_eq!(
        SubTaskSpec::infer_required_role(&parsed_legacy.objective),
        "implement"
    );
}

// ---------------------------------------------------------------------------
// 3. CritiqueSpec verdict derivation matches the §3.2 scoring rules
// ---------------------------------------------------------------------------

#[test]
fn critique_verdict_rules() {
    let all_high = CritiqueSpec::derive(
        Dimensions {
            accuracy: 9,
            completeness: 8,
            technical: 9,
            calibration: 8,
            efficiency: 10,
        },
        vec![],
        0.95,
    );
    assert_eq!(all_high.verdict, Verdict::Lgtm);
    assert!(all_high.items.is_empty());

    let floor_violation = CritiqueSpec::derive(
        Dimensions {
            accuracy: 9,
            completeness: 3,
            technical: 9,
            calibration: 9,
            efficiency: 9,
        },
        vec![],
        0.7,
    );
    assert_eq!(floor_violation.verdict, Verdict::NeedsWork);
    assert!(floor_violation
        .items
        .iter()
        .any(|i| i.dimension == "completeness"));
}

// ---------------------------------------------------------------------------
// 4. Context Bus entries: namespacing, layer TTL defaults, expiry
// ---------------------------------------------------------------------------

#[test]
fn context_entry_namespacing_and_ttl_defaults() {
    let entry = ContextEntry::new(
        "reviewer-1",
        "last_verdict",
        serde_json::json!("LGTM"),
        Layer::Session,
        None,
        Provenance::agent("reviewer-1"),
    );
    assert_eq!(entry.namespaced_key(), "reviewer-1:last_verdict");
    assert_eq!(entry.effective_ttl_seconds(), Some(3_600));
    assert!(!entry.is_expired(chrono::Utc::now()));
}

// ---------------------------------------------------------------------------
// 5. Mailbox message shapes
// ---------------------------------------------------------------------------

#[test]
fn mailbox_critique_request_shape() {
    let msg = MailboxMessage::critique_request("coder-1", "task-9", "add retries", "done");
    assert_eq!(msg.message_type, MessageType::CritiqueRequest);
    assert_eq!(msg.content["task_id"], "task-9");

    let shutdown = MailboxMessage::shutdown("runtime");
    assert_eq!(shutdown.message_type, MessageType::Shutdown);
}

// ---------------------------------------------------------------------------
// 6. Error Display and From impls
// ---------------------------------------------------------------------------

#[test]
fn error_display_and_from_impls() {
    let board_err = SwarmError::Board("task not found".to_string());
    assert_eq!(board_err.to_string(), "board error: task not found");

    let budget_err = SwarmError::BudgetExceeded {
        provider: "anthropic".into(),
        detail: "daily limit reached".into(),
    };
    assert_eq!(
        budget_err.to_string(),
        "budget exceeded for provider 'anthropic': daily limit reached"
    );

    let cancelled = SwarmError::Cancelled;
    assert_eq!(cancelled.to_string(), "operation cancelled");

    let bad_json = serde_json::from_str::<serde_json::Value>("not json");
    let swarm_err: SwarmError = bad_json.unwrap_err().into();
    assert!(swarm_err.to_string().starts_with("serialization error:"));

    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let swarm_err: SwarmError = io_err.into();
    assert!(swarm_err.to_string().starts_with("io error:"));
}

// ---------------------------------------------------------------------------
// 7. Message factories and role serialization
// ---------------------------------------------------------------------------

#[test]
fn message_factories_and_role_serialization() {
    let user_msg = Message::user("question", "task-1");
    assert_eq!(user_msg.role, Role::User);

    let assistant_msg = Message::assistant("answer", "task-1");
    assert_eq!(assistant_msg.role, Role::Assistant);

    assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");

    let success = ToolResult::success("call-1", "42");
    assert!(!success.is_error);
}
