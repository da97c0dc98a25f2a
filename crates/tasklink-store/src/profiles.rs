use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tasklink_shared::directory::DirectoryProfile;
use tasklink_shared::types::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::time;

impl Database {
    /// Insert or replace a directory profile. Profiles are written by the
    /// account system; the relationship core only reads them.
    pub fn upsert_profile(&self, profile: &DirectoryProfile) -> Result<()> {
        let skills = serde_json::to_string(&profile.skills)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.conn().execute(
            "INSERT INTO profiles (user_id, first_name, last_name, avatar_url, location, skills, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name  = excluded.last_name,
                avatar_url = excluded.avatar_url,
                location   = excluded.location,
                skills     = excluded.skills,
                updated_at = excluded.updated_at",
            params![
                profile.user_id.0,
                profile.first_name,
                profile.last_name,
                profile.avatar_url,
                profile.location,
                skills,
                time::to_sql(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: UserId) -> Result<Option<DirectoryProfile>> {
        let row = self
            .conn()
            .query_row(
                "SELECT user_id, first_name, last_name, avatar_url, location, skills
                 FROM profiles WHERE user_id = ?1",
                params![user_id.0],
                |row| {
                    Ok((
                        DirectoryProfile {
                            user_id: UserId(row.get(0)?),
                            first_name: row.get(1)?,
                            last_name: row.get(2)?,
                            avatar_url: row.get(3)?,
                            location: row.get(4)?,
                            skills: Vec::new(),
                        },
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mut profile, skills)) => {
                profile.skills = serde_json::from_str(&skills)
                    .map_err(|e| StoreError::Corrupt(format!("skills for user {user_id}: {e}")))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }
}
