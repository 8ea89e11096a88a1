#![allow(clippy::unwrap_used, clippy::expect_used)]

use swarmboard_bus::{ContextBus, MailboxHub, WakeupBus};
use swarmboard_core::{Layer, MailboxMessage, MessageType, Provenance};

#[tokio::test]
async fn context_bus_and_mailbox_coexist_on_independent_locks() {
    let dir = tempfile::tempdir().unwrap();
    let bus = ContextBus::new(dir.path().join("context_bus.json"));
    let mailbox = MailboxHub::new(dir.path().join("mailboxes"));

    bus.publish(
        "coder-1",
        "progress",
        serde_json::json!({"step": 1}),
        Layer::Task,
        None,
        Provenance::agent("coder-1"),
    )
    .await
    .unwrap();

    mailbox
        .send(
            "reviewer-1",
            MailboxMessage::critique_request("coder-1", "task-1", "implement x", "done"),
        )
        .await
        .unwrap();

    let entry = bus.get("coder-1", "progress").await.unwrap().unwrap();
    assert_eq!(entry.value["step"], 1);

    let inbox = mailbox.read("reviewer-1").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].message_type, MessageType::CritiqueRequest);
}

#[tokio::test]
async fn wakeup_bus_coalesces_multiple_notifies_into_one_wake() {
    let dir = tempfile::tempdir().unwrap();
    let wakeup = WakeupBus::new(dir.path().join("task_signals"));

    wakeup.notify().await;
    wakeup.notify().await;
    wakeup.notify().await;

    // a single wait should observe the coalesced wake without timing out
    let started = std::time::Instant::now();
    wakeup.wait(std::time::Duration::from_secs(2)).await;
    assert!(started.elapsed() < std::time::Duration::from_secs(1));
}
