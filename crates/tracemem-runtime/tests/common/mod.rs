// White-box helpers for inspecting the reference backends' on-disk state.
// Integration tests assert graph invariants directly against the SQLite
// files under the test home directory.
#![allow(dead_code)]

use std::path::Path;

use rusqlite::Connection;

pub fn graph_conn(home: &Path) -> Connection {
    Connection::open(home.join("graph").join("graph.db")).expect("open graph.db")
}

pub fn vector_conn(home: &Path) -> Connection {
    Connection::open(home.join("vectors").join("vectors.db")).expect("open vectors.db")
}

pub fn count_nodes(conn: &Connection, label: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM nodes WHERE label = ?1",
        [label],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn count_edges(conn: &Connection, label: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM edges WHERE label = ?1",
        [label],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn count_vector_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM user_texts", [], |row| row.get(0))
        .unwrap()
}

/// `(source_label, target_label)` pairs of every MESSAGE edge.
pub fn message_edge_labels(conn: &Connection) -> Vec<(String, String)> {
    let mut stmt = conn
        .prepare(
            "SELECT s.label, t.label FROM edges e \
             JOIN nodes s ON s.id = e.source_id \
             JOIN nodes t ON t.id = e.target_id \
             WHERE e.label = 'MESSAGE' ORDER BY e.rowid",
        )
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}
