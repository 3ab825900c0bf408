use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

/// Role of an active user, `None` if the user is unknown or deactivated.
pub async fn active_user_role(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<String>> {
    let role = sqlx::query_scalar::<_, String>(
        r#"
        SELECT role
        FROM users
        WHERE id = $1 AND is_active
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("read user role")?;
    Ok(role)
}
