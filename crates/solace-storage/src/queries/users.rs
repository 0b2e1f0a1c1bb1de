// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User and therapist-assignment operations.

use rusqlite::{params, OptionalExtension};
use solace_core::SolaceError;

use crate::database::{map_tr_err, now_iso, Database};
use crate::models::{parse_enum, User};

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        role: parse_enum(row.get::<_, String>(2)?, 2)?,
        group_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Insert a new user.
pub async fn create_user(db: &Database, user: &User) -> Result<(), SolaceError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, role, group_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id,
                    user.display_name,
                    user.role.to_string(),
                    user.group_id,
                    user.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a user by id.
pub async fn get_user(db: &Database, id: &str) -> Result<Option<User>, SolaceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, display_name, role, group_id, created_at
                     FROM users WHERE id = ?1",
                    params![id],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
        .map_err(map_tr_err)
}

/// Map a therapist to a patient group. Idempotent.
pub async fn assign_therapist(
    db: &Database,
    therapist_id: &str,
    group_id: &str,
) -> Result<(), SolaceError> {
    let therapist_id = therapist_id.to_string();
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO therapist_assignments (therapist_id, group_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![therapist_id, group_id, now_iso()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove a therapist-to-group mapping.
pub async fn unassign_therapist(
    db: &Database,
    therapist_id: &str,
    group_id: &str,
) -> Result<(), SolaceError> {
    let therapist_id = therapist_id.to_string();
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM therapist_assignments WHERE therapist_id = ?1 AND group_id = ?2",
                params![therapist_id, group_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Whether a therapist is assigned to a group.
pub async fn is_assigned(
    db: &Database,
    therapist_id: &str,
    group_id: &str,
) -> Result<bool, SolaceError> {
    let therapist_id = therapist_id.to_string();
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM therapist_assignments
                 WHERE therapist_id = ?1 AND group_id = ?2",
                params![therapist_id, group_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// All groups a therapist is assigned to.
pub async fn therapist_groups(
    db: &Database,
    therapist_id: &str,
) -> Result<Vec<String>, SolaceError> {
    let therapist_id = therapist_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT group_id FROM therapist_assignments
                 WHERE therapist_id = ?1 ORDER BY group_id",
            )?;
            let rows = stmt.query_map(params![therapist_id], |row| row.get(0))?;
            let mut groups = Vec::new();
            for row in rows {
                groups.push(row?);
            }
            Ok(groups)
        })
        .await
        .map_err(map_tr_err)
}

/// All therapists assigned to a group, ordered by id for stable fan-out.
pub async fn assigned_therapists(
    db: &Database,
    group_id: &str,
) -> Result<Vec<User>, SolaceError> {
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.display_name, u.role, u.group_id, u.created_at
                 FROM users u
                 JOIN therapist_assignments ta ON ta.therapist_id = u.id
                 WHERE ta.group_id = ?1
                 ORDER BY u.id",
            )?;
            let rows = stmt.query_map(params![group_id], row_to_user)?;
            let mut users = Vec::new();
            for row in rows {
                users.push(row?);
            }
            Ok(users)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::types::ActorRole;
    use tempfile::tempdir;

    fn make_user(id: &str, role: ActorRole) -> User {
        User {
            id: id.to_string(),
            display_name: format!("User {id}"),
            role,
            group_id: None,
            created_at: now_iso(),
        }
    }

    #[tokio::test]
    async fn create_and_get_user() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        create_user(&db, &make_user("t-1", ActorRole::Therapist))
            .await
            .unwrap();
        let user = get_user(&db, "t-1").await.unwrap().unwrap();
        assert_eq!(user.role, ActorRole::Therapist);
        assert!(get_user(&db, "missing").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn assignment_round_trip() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        create_user(&db, &make_user("t-1", ActorRole::Therapist))
            .await
            .unwrap();
        create_user(&db, &make_user("t-2", ActorRole::Therapist))
            .await
            .unwrap();

        assign_therapist(&db, "t-1", "grp-a").await.unwrap();
        assign_therapist(&db, "t-1", "grp-a").await.unwrap(); // idempotent
        assign_therapist(&db, "t-2", "grp-a").await.unwrap();
        assign_therapist(&db, "t-1", "grp-b").await.unwrap();

        assert!(is_assigned(&db, "t-1", "grp-a").await.unwrap());
        assert!(!is_assigned(&db, "t-2", "grp-b").await.unwrap());
        assert_eq!(
            therapist_groups(&db, "t-1").await.unwrap(),
            vec!["grp-a".to_string(), "grp-b".to_string()]
        );

        let roster = assigned_therapists(&db, "grp-a").await.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].id, "t-1");

        unassign_therapist(&db, "t-2", "grp-a").await.unwrap();
        assert_eq!(assigned_therapists(&db, "grp-a").await.unwrap().len(), 1);

        db.close().await.unwrap();
    }
}
