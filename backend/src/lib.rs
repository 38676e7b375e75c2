use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

pub mod admin;
pub mod comments;
pub mod config;
pub mod error;
pub mod puzzles;
pub mod store;

use config::{Config, DEFAULT_ADMIN_PASSWORD};
use store::{Store, StoreError};

#[derive(Clone)]
pub struct AppState {
    store: Store,
    admin_password: Arc<str>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Store::in_memory(), DEFAULT_ADMIN_PASSWORD)
    }
}

impl AppState {
    pub fn new(store: Store, admin_password: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            admin_password: admin_password.into(),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store = match &config.persist_path {
            Some(path) => Store::open(path.clone()).await?,
            None => Store::in_memory(),
        };
        Ok(Self::new(store, config.admin_password.as_str()))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }
}

pub fn app(state: AppState) -> Router {
    let api = puzzles::routes()
        .merge(comments::routes())
        .merge(admin::routes())
        .route("/health", get(health));
    Router::new().nest("/api", api).with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod testing {
    use puzzle_core::{Puzzle, PuzzleId, PuzzleInput, RewardType};

    use crate::store::{Collections, Store};

    pub const PHRASE: &str =
        "abandon ability able about above absent absorb abstract absurd abuse access accident";

    pub fn sample_input(id: PuzzleId, answer: &str, reward_type: RewardType) -> PuzzleInput {
        PuzzleInput {
            id,
            title: format!("puzzle-{id}"),
            image_url: format!("https://example.com/{id}.png"),
            answer: answer.to_string(),
            reward_type,
            recovery_phrase: Some(PHRASE.to_string()),
            reveal_image_url: Some("https://example.com/prize.png".to_string()),
            reveal_text: Some("Congrats!".to_string()),
            is_published: true,
        }
    }

    pub fn sample_puzzle(id: PuzzleId, answer: &str, reward_type: RewardType) -> Puzzle {
        Puzzle::from_input(sample_input(id, answer, reward_type), 0)
            .expect("sample input is valid")
    }

    pub fn seeded_store(puzzles: Vec<Puzzle>) -> Store {
        let data = Collections {
            puzzles: puzzles.into_iter().map(|p| (p.id, p)).collect(),
            comments: Vec::new(),
        };
        Store::from_collections(data, None)
    }
}
