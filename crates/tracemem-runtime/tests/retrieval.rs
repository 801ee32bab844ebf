// Retrieval behavior through the public façade: hybrid search, context
// expansion, cross-conversation resource lookups, and trajectories.

mod common;

use common::*;
use tracemem_runtime::{Message, RetrievalConfig, SortOrder};
use tracemem_testing::{assistant, open_test_mem, read_file_call, tool_result, user, TestMem};
use uuid::Uuid;

async fn seed_two_conversations() -> TestMem {
    let mut world = open_test_mem().await.unwrap();
    world
        .mem
        .import_trace(
            "conv-auth",
            &[user("fix the authentication bug"), assistant("on it")],
        )
        .await
        .unwrap();
    world
        .mem
        .import_trace(
            "conv-food",
            &[user("favourite pasta recipes"), assistant("carbonara")],
        )
        .await
        .unwrap();
    world
}

#[tokio::test]
async fn test_search_ranks_relevant_turn_first() {
    let world = seed_two_conversations().await;
    let hits = world.mem.search("authentication bug", None).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].conversation_id, "conv-auth");
    // Default config expands context.
    let context = hits[0].context.as_ref().expect("context attached");
    assert_eq!(
        context.user_text.as_ref().unwrap().text,
        "fix the authentication bug"
    );
    assert_eq!(context.agent_text.as_ref().unwrap().text, "on it");
}

#[tokio::test]
async fn test_search_without_context_expansion() {
    let world = seed_two_conversations().await;
    let cfg = RetrievalConfig {
        include_context: false,
        ..Default::default()
    };
    let hits = world.mem.search("authentication", Some(&cfg)).await.unwrap();
    assert!(hits.iter().all(|h| h.context.is_none()));
}

#[tokio::test]
async fn test_search_excludes_conversation() {
    let world = seed_two_conversations().await;
    let cfg = RetrievalConfig {
        exclude_conversation_id: Some("conv-auth".to_string()),
        ..Default::default()
    };
    let hits = world.mem.search("authentication bug", Some(&cfg)).await.unwrap();
    assert!(hits.iter().all(|h| h.conversation_id != "conv-auth"));
}

#[tokio::test]
async fn test_unique_conversations_deduplicates() {
    let mut world = open_test_mem().await.unwrap();
    // Two matching turns in the same conversation, one elsewhere.
    world
        .mem
        .import_trace(
            "conv-a",
            &[
                user("login bug in the auth module"),
                assistant("looking"),
                user("the login bug persists"),
                assistant("fixed"),
            ],
        )
        .await
        .unwrap();
    world
        .mem
        .import_trace("conv-b", &[user("login bug report"), assistant("ack")])
        .await
        .unwrap();

    let cfg = RetrievalConfig {
        unique_conversations: true,
        include_context: false,
        ..Default::default()
    };
    let hits = world.mem.search("login bug", Some(&cfg)).await.unwrap();
    let mut conversations: Vec<_> = hits.iter().map(|h| h.conversation_id.clone()).collect();
    conversations.sort();
    conversations.dedup();
    assert_eq!(conversations.len(), hits.len(), "conversation ids must be distinct");
}

#[tokio::test]
async fn test_vector_weight_extremes_both_answer() {
    let world = seed_two_conversations().await;
    for weight in [0.0, 1.0] {
        let cfg = RetrievalConfig {
            vector_weight: weight,
            include_context: false,
            ..Default::default()
        };
        let hits = world
            .mem
            .search("authentication bug", Some(&cfg))
            .await
            .unwrap();
        assert_eq!(hits[0].conversation_id, "conv-auth", "weight {weight}");
    }
}

#[tokio::test]
async fn test_search_touches_last_accessed() {
    let mut world = open_test_mem().await.unwrap();
    world
        .mem
        .add_message("conv-1", &user("remember this moment"))
        .await
        .unwrap();

    let read_stamps = || {
        let graph = graph_conn(world.home_path());
        graph
            .query_row(
                "SELECT created_at, last_accessed_at FROM nodes WHERE label = 'UserText'",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .unwrap()
    };
    let (created_before, accessed_before) = read_stamps();
    assert_eq!(created_before, accessed_before);

    std::thread::sleep(std::time::Duration::from_millis(2));
    world.mem.search("remember", None).await.unwrap();

    let (created_after, accessed_after) = read_stamps();
    assert_eq!(created_before, created_after);
    assert!(accessed_after > accessed_before);
}

#[tokio::test]
async fn test_get_context_for_tool_turn() {
    let mut world = open_test_mem().await.unwrap();
    let created = world
        .mem
        .import_trace(
            "conv-1",
            &[
                user("Read f"),
                Message::assistant_with_tools("reading", vec![read_file_call("c1", "/tmp/a")]),
                tool_result("c1", "AAA"),
            ],
        )
        .await
        .unwrap();

    let context = world.mem.get_context(created["user_text"]).await.unwrap();
    assert_eq!(context.user_text.as_ref().unwrap().text, "Read f");
    assert_eq!(context.agent_text.as_ref().unwrap().text, "reading");
    assert_eq!(context.tool_uses.len(), 1);
    let tool_use = &context.tool_uses[0];
    assert_eq!(tool_use.tool_name, "READ_FILE");
    assert_eq!(tool_use.properties["path"], "/tmp/a");
    assert_eq!(
        tool_use.resource_version.as_ref().unwrap().uri,
        "file:///tmp/a"
    );
    assert_eq!(tool_use.resource.as_ref().unwrap().uri, "file:///tmp/a");
}

#[tokio::test]
async fn test_get_context_unknown_id_is_empty() {
    let world = open_test_mem().await.unwrap();
    let context = world.mem.get_context(Uuid::new_v4()).await.unwrap();
    assert!(context.user_text.is_none());
    assert!(context.agent_text.is_none());
    assert!(context.tool_uses.is_empty());
}

#[tokio::test]
async fn test_trajectory_spans_turn_and_includes_follow_up() {
    let mut world = open_test_mem().await.unwrap();
    let created = world
        .mem
        .import_trace(
            "conv-1",
            &[
                user("Read f"),
                Message::assistant_with_tools("reading", vec![read_file_call("c1", "/tmp/a")]),
                tool_result("c1", "AAA"),
            ],
        )
        .await
        .unwrap();
    let start_id = created["user_text"];
    world
        .mem
        .import_trace("conv-1", &[assistant("done"), user("thanks")])
        .await
        .unwrap();

    let trajectory = world.mem.get_trajectory(start_id, None).await.unwrap();
    let texts: Vec<_> = trajectory.steps.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Read f", "reading", "done", "thanks"]);
    assert!(!trajectory.steps[1].tool_uses.is_empty());
    assert_eq!(trajectory.steps[1].tool_uses[0].tool_name, "read_file");
    assert!(trajectory.steps[3].tool_uses.is_empty());
}

#[tokio::test]
async fn test_trajectory_zero_hop() {
    let mut world = open_test_mem().await.unwrap();
    let created = world
        .mem
        .add_message("conv-1", &user("lonely message"))
        .await
        .unwrap();
    let trajectory = world
        .mem
        .get_trajectory(created["user_text"], None)
        .await
        .unwrap();
    assert_eq!(trajectory.steps.len(), 1);
    assert_eq!(trajectory.steps[0].text, "lonely message");
}

#[tokio::test]
async fn test_trajectory_unknown_id_is_empty() {
    let world = open_test_mem().await.unwrap();
    let trajectory = world.mem.get_trajectory(Uuid::new_v4(), None).await.unwrap();
    assert!(trajectory.steps.is_empty());
}

#[tokio::test]
async fn test_resource_conversations_sorting_and_exclusion() {
    let mut world = open_test_mem().await.unwrap();
    for conv in ["conv-a", "conv-b"] {
        world
            .mem
            .import_trace(
                conv,
                &[
                    user("Read f"),
                    Message::assistant_with_tools("reading", vec![read_file_call("c1", "/tmp/a")]),
                    tool_result("c1", "AAA"),
                ],
            )
            .await
            .unwrap();
    }

    let ascending = world
        .mem
        .get_conversations_for_resource(
            "file:///tmp/a",
            Some(&RetrievalConfig {
                sort_order: SortOrder::Asc,
                ..Default::default()
            }),
        )
        .await
        .unwrap();
    let stamps: Vec<_> = ascending.iter().map(|r| r.created_at).collect();
    let mut sorted = stamps.clone();
    sorted.sort();
    assert_eq!(stamps, sorted);

    let excluded = world
        .mem
        .get_conversations_for_resource(
            "file:///tmp/a",
            Some(&RetrievalConfig {
                exclude_conversation_id: Some("conv-a".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
    assert!(!excluded.is_empty());
    assert!(excluded.iter().all(|r| r.conversation_id == "conv-b"));

    let unknown = world
        .mem
        .get_conversations_for_resource("file:///nope", None)
        .await
        .unwrap();
    assert!(unknown.is_empty());
}

#[tokio::test]
async fn test_forget_conversation_clears_vectors_only() {
    let world = seed_two_conversations().await;

    let removed = world.mem.forget_conversation("conv-auth").await.unwrap();
    assert_eq!(removed, 1);

    // Absent from similarity search...
    let hits = world.mem.search("authentication bug", None).await.unwrap();
    assert!(hits.iter().all(|h| h.conversation_id != "conv-auth"));

    // ...but the graph retains the conversation's history.
    let graph = graph_conn(world.home_path());
    let remaining: i64 = graph
        .query_row(
            "SELECT COUNT(*) FROM nodes WHERE conversation_id = 'conv-auth'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(remaining > 0);
}
