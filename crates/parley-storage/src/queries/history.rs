// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation history persistence.
//!
//! Each conversation is a single row holding the whole history as a JSON
//! array, so a save replaces the history atomically.

use chrono::Utc;
use parley_core::{ConversationKey, History, ParleyError};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, to_sql_time};

/// Loads the history for `key`, or an empty history if none is stored.
pub async fn load_history(db: &Database, key: &ConversationKey) -> Result<History, ParleyError> {
    let key = *key;
    let raw: Option<String> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT messages FROM chat_history
                 WHERE user_id = ?1 AND chat_id = ?2 AND thread_id = ?3",
                params![key.user_id, key.chat_id, key.thread_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    match raw {
        Some(json) => serde_json::from_str(&json).map_err(|e| ParleyError::Storage {
            source: Box::new(e),
        }),
        None => Ok(History::new()),
    }
}

/// Inserts or replaces the history for `key`.
pub async fn save_history(
    db: &Database,
    key: &ConversationKey,
    history: &History,
) -> Result<(), ParleyError> {
    let key = *key;
    let json = serde_json::to_string(history).map_err(|e| ParleyError::Storage {
        source: Box::new(e),
    })?;
    let now = to_sql_time(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chat_history (user_id, chat_id, thread_id, messages, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id, chat_id, thread_id)
                 DO UPDATE SET messages = excluded.messages, updated_at = excluded.updated_at",
                params![key.user_id, key.chat_id, key.thread_id, json, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes the history for `key`. Deleting a missing row is not an error.
pub async fn clear_history(db: &Database, key: &ConversationKey) -> Result<(), ParleyError> {
    let key = *key;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM chat_history
                 WHERE user_id = ?1 AND chat_id = ?2 AND thread_id = ?3",
                params![key.user_id, key.chat_id, key.thread_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Lists every stored conversation, most recently updated first.
pub async fn list_conversations(db: &Database) -> Result<Vec<ConversationKey>, ParleyError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, chat_id, thread_id FROM chat_history
                 ORDER BY updated_at DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(ConversationKey {
                    user_id: row.get(0)?,
                    chat_id: row.get(1)?,
                    thread_id: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Message;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    fn history(contents: &[&str]) -> History {
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i % 2 == 0 {
                    Message::user(*c)
                } else {
                    Message::assistant(*c)
                }
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[tokio::test]
    async fn unknown_key_loads_empty() {
        let (db, _dir) = setup_db().await;
        let loaded = load_history(&db, &ConversationKey::new(1, 1, None))
            .await
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_preserves_order() {
        let (db, _dir) = setup_db().await;
        let key = ConversationKey::new(7, -100, Some(3));
        let h = history(&["hello", "Hi!", "how are you", "fine"]);
        save_history(&db, &key, &h).await.unwrap();
        assert_eq!(load_history(&db, &key).await.unwrap(), h);
    }

    #[tokio::test]
    async fn save_overwrites_previous_history() {
        let (db, _dir) = setup_db().await;
        let key = ConversationKey::new(1, 1, None);
        save_history(&db, &key, &history(&["a", "b"])).await.unwrap();
        save_history(&db, &key, &history(&["c"])).await.unwrap();
        assert_eq!(load_history(&db, &key).await.unwrap(), history(&["c"]));
        assert_eq!(list_conversations(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn threads_are_separate_conversations() {
        let (db, _dir) = setup_db().await;
        let main = ConversationKey::new(1, 1, None);
        let topic = ConversationKey::new(1, 1, Some(9));
        save_history(&db, &main, &history(&["main"])).await.unwrap();
        save_history(&db, &topic, &history(&["topic"])).await.unwrap();
        assert_eq!(load_history(&db, &main).await.unwrap(), history(&["main"]));
        assert_eq!(load_history(&db, &topic).await.unwrap(), history(&["topic"]));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let (db, _dir) = setup_db().await;
        let key = ConversationKey::new(1, 1, None);
        save_history(&db, &key, &history(&["x"])).await.unwrap();
        clear_history(&db, &key).await.unwrap();
        clear_history(&db, &key).await.unwrap();
        assert!(load_history(&db, &key).await.unwrap().is_empty());
        assert!(list_conversations(&db).await.unwrap().is_empty());
    }
}
