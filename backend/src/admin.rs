use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use puzzle_core::{Puzzle, PuzzleId, PuzzleInput};
use tracing::info;
use uuid::Uuid;

use crate::comments;
use crate::error::{not_found, ApiError, ApiJson, ApiPath};
use crate::{now_millis, AppState};

pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/puzzles", get(list_all).post(create_puzzle))
        .route("/admin/puzzles/:id", put(update_puzzle).delete(delete_puzzle))
        .route("/admin/puzzles/:id/reset", post(reset_puzzle))
        .route("/admin/comments/:id", delete(delete_comment))
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != state.admin_password() {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

async fn list_all(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Puzzle>>, ApiError> {
    require_admin(&state, &headers)?;
    let puzzles = state
        .store()
        .read(|data| data.puzzles.values().cloned().collect())
        .await;
    Ok(Json(puzzles))
}

async fn create_puzzle(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<PuzzleInput>,
) -> Result<(StatusCode, Json<Puzzle>), ApiError> {
    require_admin(&state, &headers)?;
    let now = now_millis();
    let puzzle = state
        .store()
        .transaction(|data| -> Result<Puzzle, ApiError> {
            if data.puzzles.contains_key(&input.id) {
                return Err(ApiError::Conflict(format!(
                    "puzzle {} already exists",
                    input.id
                )));
            }
            let puzzle = Puzzle::from_input(input, now)?;
            data.puzzles.insert(puzzle.id, puzzle.clone());
            Ok(puzzle)
        })
        .await?;
    info!(puzzle_id = puzzle.id, "puzzle created");
    Ok((StatusCode::CREATED, Json(puzzle)))
}

async fn update_puzzle(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<PuzzleId>,
    ApiJson(input): ApiJson<PuzzleInput>,
) -> Result<Json<Puzzle>, ApiError> {
    require_admin(&state, &headers)?;
    if input.id != id {
        return Err(ApiError::InvalidArgument(
            "body id must match the puzzle id in the path".into(),
        ));
    }
    let puzzle = state
        .store()
        .transaction(|data| -> Result<Puzzle, ApiError> {
            let puzzle = data
                .puzzles
                .get_mut(&id)
                .ok_or_else(|| not_found("puzzle", id))?;
            puzzle.apply_input(input)?;
            Ok(puzzle.clone())
        })
        .await?;
    info!(puzzle_id = id, "puzzle updated");
    Ok(Json(puzzle))
}

async fn reset_puzzle(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<PuzzleId>,
) -> Result<Json<Puzzle>, ApiError> {
    require_admin(&state, &headers)?;
    let puzzle = state
        .store()
        .transaction(|data| -> Result<Puzzle, ApiError> {
            let puzzle = data
                .puzzles
                .get_mut(&id)
                .ok_or_else(|| not_found("puzzle", id))?;
            puzzle.reset();
            Ok(puzzle.clone())
        })
        .await?;
    info!(puzzle_id = id, "puzzle reset");
    Ok(Json(puzzle))
}

async fn delete_puzzle(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<PuzzleId>,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &headers)?;
    state
        .store()
        .transaction(|data| -> Result<(), ApiError> {
            data.puzzles
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| not_found("puzzle", id))
        })
        .await?;
    info!(puzzle_id = id, "puzzle deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &headers)?;
    comments::remove_unchecked(state.store(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
