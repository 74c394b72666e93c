//! Guest-to-user merge.
//!
//! When a guest registers with the email they used as a guest, their history
//! folds into the new account: activity counters carry over, non-draft
//! orders are reassigned, and the guest's conversation (messages and any
//! uploaded files with it) is discarded along with the guest record itself.
//! Runs detached from the registration response; a failed merge leaves the
//! guest row behind for a later retry and never blocks the registration.

use std::path::Path;

use rusqlite::{params, OptionalExtension};

use crate::db::DbPool;

#[derive(Debug)]
pub enum MergeError {
    Db(rusqlite::Error),
    Pool,
}

impl std::fmt::Display for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeError::Db(e) => write!(f, "database error: {}", e),
            MergeError::Pool => write!(f, "connection pool poisoned"),
        }
    }
}

impl std::error::Error for MergeError {}

impl From<rusqlite::Error> for MergeError {
    fn from(e: rusqlite::Error) -> Self {
        MergeError::Db(e)
    }
}

/// Merge the guest matching `email` into `user_id`, if one exists.
/// Returns whether a merge actually happened.
pub async fn merge_guest_into_user(
    db: DbPool,
    data_dir: String,
    email: String,
    user_id: String,
) -> Result<bool, MergeError> {
    let merged = tokio::task::spawn_blocking(move || {
        merge_blocking(&db, &data_dir, &email, &user_id)
    })
    .await
    .map_err(|_| MergeError::Pool)??;

    Ok(merged)
}

/// Synchronous merge body. The database side runs in one transaction; file
/// removal happens after commit and is best-effort.
pub fn merge_blocking(
    db: &DbPool,
    data_dir: &str,
    email: &str,
    user_id: &str,
) -> Result<bool, MergeError> {
    let mut conn = db.lock().map_err(|_| MergeError::Pool)?;
    let tx = conn.transaction()?;

    let guest: Option<(String, i64, i64, i64)> = tx
        .query_row(
            "SELECT id, orders_count, finished_count, canceled_count
             FROM guests WHERE email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((guest_id, orders, finished, canceled)) = guest else {
        return Ok(false);
    };

    tx.execute(
        "UPDATE users SET orders_count = orders_count + ?2,
                          finished_count = finished_count + ?3,
                          canceled_count = canceled_count + ?4
         WHERE id = ?1",
        params![user_id, orders, finished, canceled],
    )?;

    tx.execute(
        "UPDATE orders SET user_id = ?1, guest_id = NULL
         WHERE guest_id = ?2 AND status != 'draft'",
        params![user_id, guest_id],
    )?;
    // Drafts stay unowned, detached from the guest row deleted below
    tx.execute(
        "UPDATE orders SET guest_id = NULL WHERE guest_id = ?1",
        params![guest_id],
    )?;

    // Collect upload paths before the cascade removes the message rows
    let mut files: Vec<String> = Vec::new();
    let conversation_id: Option<String> = tx
        .query_row(
            "SELECT id FROM conversations WHERE guest_id = ?1",
            params![guest_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(cid) = &conversation_id {
        let mut stmt = tx.prepare(
            "SELECT file_path FROM messages
             WHERE conversation_id = ?1 AND file_path IS NOT NULL",
        )?;
        files = stmt
            .query_map(params![cid], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        tx.execute("DELETE FROM conversations WHERE id = ?1", params![cid])?;
    }

    tx.execute("DELETE FROM guests WHERE id = ?1", params![guest_id])?;
    tx.commit()?;

    for file in files {
        let path = Path::new(data_dir).join(&file);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "could not remove merged guest upload");
        }
    }

    tracing::info!(user = %user_id, "merged guest history into user account");
    Ok(true)
}
