use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::dto::{ListQuery, MealPlanMessage, MealPlanPage, MealPlanPatch, NewMealPlan, SuggestionResponse};
use super::repo;
use super::repo_types::MealPlan;
use crate::{
    auth::extractors::{AdminUser, AuthUser},
    state::AppState,
};

type ApiResult<T> = Result<T, (StatusCode, String)>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/mealplans", get(list_meal_plans).post(create_meal_plan))
        .route("/mealplans/suggested", get(suggested_meal_plans))
        .route(
            "/mealplans/:id",
            get(get_meal_plan).put(update_meal_plan).delete(delete_meal_plan),
        )
}

/// GET /mealplans/suggested
#[instrument(skip(state))]
pub async fn suggested_meal_plans(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<SuggestionResponse>> {
    let response = state.suggester.suggest(user_id).await.map_err(|e| {
        error!(error = %e, %user_id, "suggested meal plans failed");
        internal(e)
    })?;
    Ok(Json(response))
}

/// GET /mealplans?q=&diet=&goal=&page=&limit=
#[instrument(skip(state))]
pub async fn list_meal_plans(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<MealPlanPage>> {
    let filter = q.to_filter().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let (items, total) = repo::list(&state.db, &filter).await.map_err(internal)?;
    let page_size = q.page_size();
    Ok(Json(MealPlanPage {
        items,
        total,
        page: q.page(),
        pages: (total + page_size - 1) / page_size,
    }))
}

#[instrument(skip(state))]
pub async fn get_meal_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MealPlan>> {
    repo::get(&state.db, id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(not_found)
}

#[instrument(skip(state, body))]
pub async fn create_meal_plan(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Json(mut body): Json<NewMealPlan>,
) -> ApiResult<(StatusCode, Json<MealPlanMessage>)> {
    body.validate().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let plan = repo::insert(&state.db, &body, admin_id).await.map_err(internal)?;
    info!(plan_id = %plan.id, %admin_id, "meal plan created");
    Ok((
        StatusCode::CREATED,
        Json(MealPlanMessage {
            message: "Meal plan created",
            meal_plan: Some(plan),
        }),
    ))
}

#[instrument(skip(state, body))]
pub async fn update_meal_plan(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
    Json(mut body): Json<MealPlanPatch>,
) -> ApiResult<Json<MealPlanMessage>> {
    body.validate().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let plan = repo::update(&state.db, id, &body)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    info!(plan_id = %plan.id, %admin_id, "meal plan updated");
    Ok(Json(MealPlanMessage {
        message: "Meal plan updated",
        meal_plan: Some(plan),
    }))
}

#[instrument(skip(state))]
pub async fn delete_meal_plan(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MealPlanMessage>> {
    if !repo::delete(&state.db, id).await.map_err(internal)? {
        return Err(not_found());
    }
    info!(plan_id = %id, %admin_id, "meal plan deleted");
    Ok(Json(MealPlanMessage {
        message: "Meal plan deleted",
        meal_plan: None,
    }))
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Meal plan not found".into())
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
