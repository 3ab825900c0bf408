use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::dto::{MealPlanPatch, NewMealPlan, PlanListFilter};
use super::repo_types::{tags_to_strings, DietTag, GoalType, MealPlan, MealPlanRow};
use super::scoring::{stage_filter, Stage, TagFilter};

const PLAN_COLUMNS: &str = "id, title, description, calories, protein, fat, carbs, \
     diet_tags, goal_type, is_active, created_by, created_at, updated_at";

/// Read access the suggestion pipeline needs from the plan store.
#[async_trait]
pub trait MealPlanStore: Send + Sync {
    /// Active plans, most recently updated first.
    async fn recent_active(&self, limit: i64) -> anyhow::Result<Vec<MealPlan>>;
    /// Active plans eligible for a fallback stage, in that stage's order, at most `limit`.
    async fn stage_plans(
        &self,
        stage: Stage,
        prefs: &[DietTag],
        goal: Option<GoalType>,
        limit: i64,
    ) -> anyhow::Result<Vec<MealPlan>>;
}

#[derive(Clone)]
pub struct PgMealPlanStore {
    db: PgPool,
}

impl PgMealPlanStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MealPlanStore for PgMealPlanStore {
    async fn recent_active(&self, limit: i64) -> anyhow::Result<Vec<MealPlan>> {
        let sql = format!(
            "SELECT {PLAN_COLUMNS} FROM meal_plans
             WHERE is_active
             ORDER BY updated_at DESC, created_at DESC
             LIMIT $1"
        );
        let rows = sqlx::query_as::<_, MealPlanRow>(&sql)
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .context("load recent active meal plans")?;
        into_plans(rows)
    }

    async fn stage_plans(
        &self,
        stage: Stage,
        prefs: &[DietTag],
        goal: Option<GoalType>,
        limit: i64,
    ) -> anyhow::Result<Vec<MealPlan>> {
        let Some(mut qb) = stage_query(stage, prefs, goal, limit) else {
            return Ok(Vec::new());
        };
        let rows = qb
            .build_query_as::<MealPlanRow>()
            .fetch_all(&self.db)
            .await
            .with_context(|| format!("load {stage:?} fallback meal plans"))?;
        into_plans(rows)
    }
}

/// SQL for one fallback stage; mirrors `scoring::rank_stage`.
fn stage_query(
    stage: Stage,
    prefs: &[DietTag],
    goal: Option<GoalType>,
    limit: i64,
) -> Option<QueryBuilder<'static, Postgres>> {
    let filter = stage_filter(stage, prefs)?;
    let goal = goal.map(GoalType::as_str);

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {PLAN_COLUMNS} FROM meal_plans WHERE is_active"
    ));
    match &filter {
        TagFilter::ContainsAll(tags) => {
            qb.push(" AND diet_tags @> ")
                .push_bind(tags_to_strings(tags))
                .push("::text[]");
        }
        TagFilter::ContainsAny(tags) => {
            qb.push(" AND diet_tags && ")
                .push_bind(tags_to_strings(tags))
                .push("::text[]");
        }
        TagFilter::Any => {}
    }

    match stage {
        Stage::HardMatch => {
            qb.push(" ORDER BY COALESCE(goal_type = ")
                .push_bind(goal)
                .push("::text, FALSE)::int DESC, created_at DESC");
        }
        Stage::SoftOverlap => {
            qb.push(" ORDER BY 2 * cardinality(ARRAY(SELECT unnest(diet_tags) INTERSECT SELECT unnest(")
                .push_bind(tags_to_strings(prefs))
                .push("::text[]))) + 3 * COALESCE(goal_type = ")
                .push_bind(goal)
                .push("::text, FALSE)::int DESC, created_at DESC");
        }
        Stage::Recency => {
            qb.push(" ORDER BY created_at DESC");
        }
    }
    qb.push(" LIMIT ").push_bind(limit);
    Some(qb)
}

fn into_plans(rows: Vec<MealPlanRow>) -> anyhow::Result<Vec<MealPlan>> {
    rows.into_iter().map(MealPlan::try_from).collect()
}

fn push_list_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &PlanListFilter) {
    qb.push(" WHERE is_active");
    if let Some(text) = q.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", escape_like(text));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if !q.diet.is_empty() {
        qb.push(" AND diet_tags && ")
            .push_bind(tags_to_strings(&q.diet))
            .push("::text[]");
    }
    if let Some(goal) = q.goal {
        qb.push(" AND goal_type = ").push_bind(goal.as_str());
    }
}

/// Public listing: active plans only, newest first. Returns the page and the total count.
pub async fn list(db: &PgPool, q: &PlanListFilter) -> anyhow::Result<(Vec<MealPlan>, i64)> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM meal_plans");
    push_list_filters(&mut count, q);
    let total: i64 = count
        .build_query_scalar::<i64>()
        .fetch_one(db)
        .await
        .context("count meal plans")?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {PLAN_COLUMNS} FROM meal_plans"));
    push_list_filters(&mut select, q);
    select
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(q.limit)
        .push(" OFFSET ")
        .push_bind(q.offset);
    let rows = select
        .build_query_as::<MealPlanRow>()
        .fetch_all(db)
        .await
        .context("list meal plans")?;

    Ok((into_plans(rows)?, total))
}

pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<MealPlan>> {
    let sql = format!("SELECT {PLAN_COLUMNS} FROM meal_plans WHERE id = $1");
    let row = sqlx::query_as::<_, MealPlanRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
        .context("get meal plan")?;
    row.map(MealPlan::try_from).transpose()
}

pub async fn insert(db: &PgPool, new: &NewMealPlan, created_by: Uuid) -> anyhow::Result<MealPlan> {
    let sql = format!(
        "INSERT INTO meal_plans
            (title, description, calories, protein, fat, carbs, diet_tags, goal_type, is_active, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING {PLAN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, MealPlanRow>(&sql)
        .bind(new.title.trim())
        .bind(&new.description)
        .bind(new.calories)
        .bind(new.protein)
        .bind(new.fat)
        .bind(new.carbs)
        .bind(tags_to_strings(&new.diet_tags))
        .bind(new.goal_type.as_str())
        .bind(new.is_active)
        .bind(created_by)
        .fetch_one(db)
        .await
        .context("insert meal plan")?;
    MealPlan::try_from(row)
}

pub async fn update(db: &PgPool, id: Uuid, patch: &MealPlanPatch) -> anyhow::Result<Option<MealPlan>> {
    let sql = format!(
        "UPDATE meal_plans SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            calories = COALESCE($4, calories),
            protein = COALESCE($5, protein),
            fat = COALESCE($6, fat),
            carbs = COALESCE($7, carbs),
            diet_tags = COALESCE($8, diet_tags),
            goal_type = COALESCE($9, goal_type),
            is_active = COALESCE($10, is_active),
            updated_at = now()
         WHERE id = $1
         RETURNING {PLAN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, MealPlanRow>(&sql)
        .bind(id)
        .bind(patch.title.as_deref().map(str::trim))
        .bind(patch.description.as_deref())
        .bind(patch.calories)
        .bind(patch.protein)
        .bind(patch.fat)
        .bind(patch.carbs)
        .bind(patch.diet_tags.as_deref().map(tags_to_strings))
        .bind(patch.goal_type.map(|g| g.as_str()))
        .bind(patch.is_active)
        .fetch_optional(db)
        .await
        .context("update meal plan")?;
    row.map(MealPlan::try_from).transpose()
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM meal_plans WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete meal plan")?;
    Ok(res.rows_affected() > 0)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
