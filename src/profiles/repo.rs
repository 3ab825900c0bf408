use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Profile, ProfileRow};

const PROFILE_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.name, p.age, p.weight, p.height, p.dietary_preferences,
           p.goal, p.unit_system, p.calorie_target, p.allergies, u.gender,
           p.is_active, p.created_at, p.updated_at
      FROM profiles p
      JOIN users u ON u.id = p.user_id
"#;

/// Profile lookups used by the resolver.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The profile id the user record points at, if any.
    async fn active_profile_pointer(&self, user_id: Uuid) -> anyhow::Result<Option<Uuid>>;
    /// Profile by id, only if it belongs to `user_id`.
    async fn find_owned(&self, profile_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Profile>>;
    /// Most recently touched active profile of the user.
    async fn latest_active(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>>;
}

#[derive(Clone)]
pub struct PgProfileStore {
    db: PgPool,
}

impl PgProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn active_profile_pointer(&self, user_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        let pointer = sqlx::query_scalar::<_, Option<Uuid>>(
            "SELECT active_profile_id FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("read active profile pointer")?;
        Ok(pointer.flatten())
    }

    async fn find_owned(&self, profile_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let sql = format!("{PROFILE_SELECT} WHERE p.id = $1 AND p.user_id = $2");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(profile_id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("find profile by id")?;
        row.map(Profile::try_from).transpose()
    }

    async fn latest_active(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let sql = format!(
            "{PROFILE_SELECT} WHERE p.user_id = $1 AND p.is_active
             ORDER BY p.updated_at DESC, p.created_at DESC
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("find latest active profile")?;
        row.map(Profile::try_from).transpose()
    }
}
