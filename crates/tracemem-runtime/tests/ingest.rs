// End-to-end ingestion scenarios exercised through the public façade,
// with graph invariants asserted against the on-disk store.

mod common;

use std::sync::Arc;

use common::*;
use tracemem_runtime::{content_hash, Config, Message, TraceMem};
use tracemem_testing::{
    assistant, open_test_mem, read_file_call, tool_result, user, HashEmbedder, EMBED_DIMENSIONS,
};

#[tokio::test]
async fn test_single_user_message() {
    let mut world = open_test_mem().await.unwrap();
    let created = world.mem.add_message("conv-1", &user("Hi")).await.unwrap();
    assert!(created.contains_key("user_text"));

    let graph = graph_conn(world.home_path());
    assert_eq!(count_nodes(&graph, "UserText"), 1);
    assert_eq!(count_nodes(&graph, "AgentText"), 0);
    assert_eq!(count_edges(&graph, "MESSAGE"), 0);

    let (text, turn): (String, i64) = graph
        .query_row(
            "SELECT text, turn_index FROM nodes WHERE label = 'UserText'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(text, "Hi");
    assert_eq!(turn, 0);

    let vectors = vector_conn(world.home_path());
    assert_eq!(count_vector_rows(&vectors), 1);
}

#[tokio::test]
async fn test_user_then_assistant_links_one_edge() {
    let mut world = open_test_mem().await.unwrap();
    world
        .mem
        .import_trace("conv-1", &[user("Hi"), assistant("Hello")])
        .await
        .unwrap();

    let graph = graph_conn(world.home_path());
    assert_eq!(count_nodes(&graph, "UserText"), 1);
    assert_eq!(count_nodes(&graph, "AgentText"), 1);
    assert_eq!(
        message_edge_labels(&graph),
        vec![("UserText".to_string(), "AgentText".to_string())]
    );

    // Both land in turn 0.
    let turns: Vec<i64> = {
        let mut stmt = graph
            .prepare("SELECT turn_index FROM nodes ORDER BY rowid")
            .unwrap();
        let turns = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        turns
    };
    assert_eq!(turns, vec![0, 0]);
}

#[tokio::test]
async fn test_tool_read_creates_resource_chain() {
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
    assert!(created.contains_key("resource_file:///tmp/a"));
    assert!(created.contains_key("resource_version_file:///tmp/a"));

    let graph = graph_conn(world.home_path());
    assert_eq!(count_nodes(&graph, "Resource"), 1);
    assert_eq!(count_nodes(&graph, "ResourceVersion"), 1);
    assert_eq!(count_edges(&graph, "VERSION_OF"), 1);
    assert_eq!(count_edges(&graph, "TOOL_USE"), 1);

    let (uri, hash): (String, String) = graph
        .query_row(
            "SELECT uri, current_content_hash FROM nodes WHERE label = 'Resource'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(uri, "file:///tmp/a");
    assert_eq!(hash, content_hash("AAA"));

    let (tool_name, properties): (String, String) = graph
        .query_row(
            "SELECT tool_name, properties FROM edges WHERE label = 'TOOL_USE'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(tool_name, "READ_FILE");
    let properties: serde_json::Value = serde_json::from_str(&properties).unwrap();
    assert_eq!(properties["path"], "/tmp/a");
}

#[tokio::test]
async fn test_same_content_across_conversations_shares_version() {
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

    let graph = graph_conn(world.home_path());
    assert_eq!(count_nodes(&graph, "Resource"), 1);
    assert_eq!(count_nodes(&graph, "ResourceVersion"), 1);
    assert_eq!(count_edges(&graph, "VERSION_OF"), 1);
    // The access itself is still recorded once per conversation.
    assert_eq!(count_edges(&graph, "TOOL_USE"), 2);

    let refs = world
        .mem
        .get_conversations_for_resource("file:///tmp/a", None)
        .await
        .unwrap();
    let mut conversations: Vec<_> = refs.iter().map(|r| r.conversation_id.clone()).collect();
    conversations.sort();
    conversations.dedup();
    assert_eq!(conversations, vec!["conv-a", "conv-b"]);
}

#[tokio::test]
async fn test_changed_content_extends_version_chain() {
    let mut world = open_test_mem().await.unwrap();
    for (conv, content) in [("conv-a", "AAA"), ("conv-b", "BBB")] {
        world
            .mem
            .import_trace(
                conv,
                &[
                    user("Read f"),
                    Message::assistant_with_tools("reading", vec![read_file_call("c1", "/tmp/a")]),
                    tool_result("c1", content),
                ],
            )
            .await
            .unwrap();
    }

    let graph = graph_conn(world.home_path());
    // Identity is stable; content history grows.
    assert_eq!(count_nodes(&graph, "Resource"), 1);
    assert_eq!(count_nodes(&graph, "ResourceVersion"), 2);
    assert_eq!(count_edges(&graph, "VERSION_OF"), 2);

    let hash: String = graph
        .query_row(
            "SELECT current_content_hash FROM nodes WHERE label = 'Resource'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(hash, content_hash("BBB"));
}

#[tokio::test]
async fn test_turn_indexes_are_monotonic() {
    let mut world = open_test_mem().await.unwrap();
    for turn in ["one", "two", "three"] {
        world
            .mem
            .import_trace(
                "conv-1",
                &[user(turn), assistant("ack"), assistant("done")],
            )
            .await
            .unwrap();
    }

    let graph = graph_conn(world.home_path());
    let mut stmt = graph
        .prepare(
            "SELECT turn_index FROM nodes WHERE conversation_id = 'conv-1' \
             ORDER BY created_at ASC, rowid ASC",
        )
        .unwrap();
    let turns: Vec<i64> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(turns, vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);
}

#[tokio::test]
async fn test_chain_links_every_adjacent_pair() {
    let mut world = open_test_mem().await.unwrap();
    world
        .mem
        .import_trace(
            "conv-1",
            &[user("first"), assistant("one"), user("second"), assistant("two")],
        )
        .await
        .unwrap();

    let graph = graph_conn(world.home_path());
    // u1 -> a1 -> u2 -> a2: three edges for four nodes, including the
    // cross-turn link from a1 to u2.
    assert_eq!(
        message_edge_labels(&graph),
        vec![
            ("UserText".to_string(), "AgentText".to_string()),
            ("AgentText".to_string(), "UserText".to_string()),
            ("UserText".to_string(), "AgentText".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_embedding_parity_with_graph() {
    let mut world = open_test_mem().await.unwrap();
    world
        .mem
        .import_trace(
            "conv-1",
            &[user("one"), assistant("ack"), user("two"), user("three")],
        )
        .await
        .unwrap();

    let graph = graph_conn(world.home_path());
    let vectors = vector_conn(world.home_path());
    // Exactly the UserText nodes are embedded, nothing else.
    assert_eq!(count_nodes(&graph, "UserText"), count_vector_rows(&vectors));
    assert_eq!(count_vector_rows(&vectors), 3);
}

#[tokio::test]
async fn test_reopen_preserves_state() {
    let home = tempfile::tempdir().unwrap();
    let config = Config {
        home: Some(home.path().to_path_buf()),
        embedding_dimensions: EMBED_DIMENSIONS,
        ..Default::default()
    };
    let embedder = Arc::new(HashEmbedder::new(EMBED_DIMENSIONS));

    let mut mem = TraceMem::open(config.clone(), embedder.clone()).await.unwrap();
    mem.import_trace("conv-1", &[user("remember the login bug"), assistant("noted")])
        .await
        .unwrap();
    mem.close().await.unwrap();

    let mut mem = TraceMem::open(config, embedder).await.unwrap();
    // Turn numbering continues where it left off.
    let created = mem.add_message("conv-1", &user("any update?")).await.unwrap();
    let hits = mem.search("login bug", None).await.unwrap();
    assert!(!hits.is_empty());

    let graph = graph_conn(home.path());
    let turn: i64 = graph
        .query_row(
            "SELECT turn_index FROM nodes WHERE id = ?1",
            [created["user_text"].to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(turn, 1);
    mem.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_reranker_fails_at_open() {
    let home = tempfile::tempdir().unwrap();
    let config = Config {
        home: Some(home.path().to_path_buf()),
        embedding_dimensions: EMBED_DIMENSIONS,
        reranker: "cohere".to_string(),
        ..Default::default()
    };
    let err = TraceMem::open(config, Arc::new(HashEmbedder::new(EMBED_DIMENSIONS)))
        .await
        .err()
        .expect("open should fail");
    assert!(err.to_string().contains("cohere"));
}

#[tokio::test]
async fn test_dimension_mismatch_fails_at_open() {
    let home = tempfile::tempdir().unwrap();
    let config = Config {
        home: Some(home.path().to_path_buf()),
        embedding_dimensions: 32,
        ..Default::default()
    };
    // Embedder dimension disagrees with the configured database dimension.
    let err = TraceMem::open(config, Arc::new(HashEmbedder::new(EMBED_DIMENSIONS)))
        .await
        .err()
        .expect("open should fail");
    assert!(err.to_string().contains("dimension"));
}
