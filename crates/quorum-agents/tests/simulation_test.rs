//! End-to-end simulation: several agents, an in-memory queue, and the
//! period driver running the full round cycle.

use std::sync::Arc;

use consensus::{AgentId, RoundState, WorkItem, WorkKind, MAX_TRIES};
use quorum_agents::{
    AgentContext, CompletionClient, InMemoryQueue, LocalRandomness, PeriodDriver, ScriptedClient,
};

fn build_driver(
    agent_count: usize,
    queue: Arc<InMemoryQueue>,
    client: Arc<dyn CompletionClient>,
) -> PeriodDriver {
    let randomness = Arc::new(LocalRandomness::new("sim-seed"));
    let agents = (0..agent_count)
        .map(|i| {
            AgentContext::new(
                AgentId::new(format!("agent-{i}")),
                queue.clone(),
                client.clone(),
                randomness.clone(),
                8,
            )
        })
        .collect();
    PeriodDriver::new(agents)
}

fn item(id: &str, offset_ms: i64) -> WorkItem {
    WorkItem::with_id(id, WorkKind::Completion, format!("input for {id}"))
        .with_request_time(chrono::Utc::now() + chrono::Duration::milliseconds(offset_ms))
}

#[tokio::test]
async fn test_queue_submissions_are_processed_and_published() {
    let queue = Arc::new(InMemoryQueue::new());
    for i in 0..4 {
        queue.submit(item(&format!("req-{i}"), i)).await;
    }

    let mut driver = build_driver(3, queue.clone(), Arc::new(ScriptedClient::new()));
    driver.run_period().await.unwrap();

    // Three agents assign at most three items per pass; the fourth waits.
    let data = driver.data();
    assert_eq!(data.period_count, 1);
    assert_eq!(data.requests.len(), 1);
    assert_eq!(data.requests[0].id, "req-3");
    assert_eq!(data.responses.len(), 3);

    driver.run_period().await.unwrap();

    let data = driver.data();
    assert!(data.requests.is_empty());
    assert_eq!(data.responses.len(), 4);
    assert!(data.responses.iter().all(|r| r.processed && r.published));

    let published = queue.published().await;
    assert_eq!(published.len(), 4);
    assert_eq!(
        published[0].output.as_deref(),
        Some("echo[0]: input for req-0")
    );
}

#[tokio::test]
async fn test_failed_item_is_retried_in_a_later_period() {
    let queue = Arc::new(InMemoryQueue::new());
    queue.submit(item("flaky", 0)).await;

    // One failure, then success on the retry.
    let client = Arc::new(ScriptedClient::new().fail_item("flaky", 1));
    let mut driver = build_driver(3, queue.clone(), client);

    driver.run_period().await.unwrap();
    let data = driver.data();
    assert_eq!(data.requests.len(), 1);
    assert_eq!(data.requests[0].num_tries, 1);
    assert!(data.requests[0].error);
    assert!(queue.published().await.is_empty());

    driver.run_period().await.unwrap();
    let data = driver.data();
    assert!(data.requests.is_empty());
    assert_eq!(data.responses.len(), 1);
    assert_eq!(queue.published().await.len(), 1);
}

#[tokio::test]
async fn test_exhausted_item_lands_in_dead_letters() {
    let queue = Arc::new(InMemoryQueue::new());
    queue.submit(item("doomed", 0)).await;

    let client = Arc::new(ScriptedClient::new().fail_item("doomed", 10));
    let mut driver = build_driver(3, queue.clone(), client);

    // One failed attempt per period; the item is evicted once it has
    // accumulated the maximum number of tries.
    for _ in 0..MAX_TRIES {
        driver.run_period().await.unwrap();
    }
    assert_eq!(driver.data().requests.len(), 1);
    assert_eq!(driver.data().requests[0].num_tries, MAX_TRIES);

    driver.run_period().await.unwrap();
    let data = driver.data();
    assert!(data.requests.is_empty());
    assert_eq!(data.dead_letters.len(), 1);
    assert_eq!(data.dead_letters[0].id, "doomed");
    assert!(queue.published().await.is_empty());
}

#[tokio::test]
async fn test_chat_memory_threads_across_periods() {
    let queue = Arc::new(InMemoryQueue::new());
    queue
        .submit(
            WorkItem::with_id("chat-1", WorkKind::Chat, "first question").with_memory("mem-1"),
        )
        .await;

    let mut driver = build_driver(3, queue.clone(), Arc::new(ScriptedClient::new()));
    driver.run_period().await.unwrap();

    let history = driver.data().chat_histories.get("mem-1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].role, "assistant");

    // A follow-up on the same memory sees the accumulated history.
    queue
        .submit(WorkItem::with_id("chat-2", WorkKind::Chat, "follow-up").with_memory("mem-1"))
        .await;
    driver.run_period().await.unwrap();

    let data = driver.data();
    assert_eq!(data.chat_histories.get("mem-1").unwrap().len(), 4);
    let follow_up = data.responses.iter().find(|r| r.id == "chat-2").unwrap();
    assert_eq!(follow_up.output.as_deref(), Some("echo[2]: follow-up"));
}

#[tokio::test]
async fn test_empty_period_skips_processing() {
    let queue = Arc::new(InMemoryQueue::new());
    let mut driver = build_driver(3, queue.clone(), Arc::new(ScriptedClient::new()));

    driver.run_period().await.unwrap();

    let data = driver.data();
    assert_eq!(data.period_count, 1);
    assert!(data.responses.is_empty());
    assert!(queue.published().await.is_empty());
    assert_eq!(driver.state(), RoundState::CollectRandomness);
}

#[tokio::test]
async fn test_locally_submitted_items_reach_the_quorum() {
    let queue = Arc::new(InMemoryQueue::new());
    let mut driver = build_driver(3, queue.clone(), Arc::new(ScriptedClient::new()));

    // Submitted through a non-keeper agent's ingress rather than the queue.
    driver.submit_to(1, item("local-1", 0));
    driver.run_period().await.unwrap();

    let data = driver.data();
    assert_eq!(data.responses.len(), 1);
    assert_eq!(data.responses[0].id, "local-1");
    assert_eq!(queue.published().await.len(), 1);
}
