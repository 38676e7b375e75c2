use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{not_found, ApiError, ApiJson, ApiPath};
use crate::store::Store;
use crate::{now_millis, AppState};

const AUTHOR_MAX_CHARS: usize = 30;
const CONTENT_MAX_CHARS: usize = 500;
const PASSWORD_MIN_CHARS: usize = 4;
const PASSWORD_MAX_CHARS: usize = 64;
const LIST_LIMIT: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub author: String,
    pub content: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub created_at: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicComment {
    pub id: Uuid,
    pub author: String,
    pub content: String,
    pub created_at: u64,
}

impl From<&Comment> for PublicComment {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            author: comment.author.clone(),
            content: comment.content.clone(),
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewComment {
    pub author: String,
    pub content: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteCommentRequest {
    pub password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(post_comment))
        .route("/comments/:id", delete(delete_comment))
}

pub async fn list_recent(store: &Store) -> Vec<PublicComment> {
    store
        .read(|data| {
            data.comments
                .iter()
                .rev()
                .take(LIST_LIMIT)
                .map(PublicComment::from)
                .collect()
        })
        .await
}

pub async fn add_comment(store: &Store, new: NewComment) -> Result<PublicComment, ApiError> {
    let author = bounded(new.author.trim(), "author", 1, AUTHOR_MAX_CHARS)?;
    let content = bounded(new.content.trim(), "content", 1, CONTENT_MAX_CHARS)?;
    bounded(&new.password, "password", PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS)?;

    let password = new.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| ApiError::Internal(format!("hashing task failed: {err}")))??;

    let comment = Comment {
        id: Uuid::new_v4(),
        author,
        content,
        password_hash,
        created_at: now_millis(),
    };
    let public = PublicComment::from(&comment);
    store
        .transaction(|data| -> Result<(), ApiError> {
            data.comments.push(comment);
            Ok(())
        })
        .await?;
    info!(comment_id = %public.id, "comment posted");
    Ok(public)
}

/// Removes a comment if `password` matches the one it was posted with.
pub async fn remove_comment(store: &Store, id: Uuid, password: String) -> Result<(), ApiError> {
    let hash = store
        .read(|data| {
            data.comments
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.password_hash.clone())
        })
        .await
        .ok_or_else(|| not_found("comment", id))?;

    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|err| ApiError::Internal(format!("hashing task failed: {err}")))?;
    if !matches {
        return Err(ApiError::PermissionDenied("wrong comment password".into()));
    }

    remove_unchecked(store, id).await
}

pub async fn remove_unchecked(store: &Store, id: Uuid) -> Result<(), ApiError> {
    store
        .transaction(|data| -> Result<(), ApiError> {
            let index = data
                .comments
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| not_found("comment", id))?;
            data.comments.remove(index);
            Ok(())
        })
        .await?;
    info!(comment_id = %id, "comment deleted");
    Ok(())
}

fn bounded(value: &str, field: &str, min: usize, max: usize) -> Result<String, ApiError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::InvalidArgument(format!(
            "{field} must be {min} to {max} characters"
        )));
    }
    Ok(value.to_string())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(format!("could not hash comment password: {err}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

async fn list_comments(State(state): State<AppState>) -> Json<Vec<PublicComment>> {
    Json(list_recent(state.store()).await)
}

async fn post_comment(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewComment>,
) -> Result<(StatusCode, Json<PublicComment>), ApiError> {
    let comment = add_comment(state.store(), payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<DeleteCommentRequest>,
) -> Result<StatusCode, ApiError> {
    remove_comment(state.store(), id, payload.password).await?;
    Ok(StatusCode::NO_CONTENT)
}
