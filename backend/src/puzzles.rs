use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use puzzle_core::{PublicPuzzle, Puzzle, PuzzleId, SolveTransition, VerifyOutcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{not_found, ApiError, ApiJson, ApiPath};
use crate::store::{Store, StoreError};
use crate::{now_millis, AppState};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRequest {
    pub guess: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerResponse {
    pub answer: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/puzzles", get(list_puzzles))
        .route("/puzzles/:id", get(get_puzzle))
        .route("/puzzles/:id/verify", post(verify))
        .route("/puzzles/:id/answer", get(solved_answer))
        .route("/puzzles/:id/solver", post(set_solver))
}

/// Checks `guess` against the puzzle and, if correct, tries to become its
/// first solver.
///
/// Correctness is decided first. A wrong guess bumps `wrongAttempts` in its
/// own transaction; a failure to persist that bump is logged and otherwise
/// ignored. A correct guess runs the check-and-set in a single transaction, so
/// among concurrent correct guesses exactly one gets the reward and the rest
/// see `already_solved`. If the reward is misconfigured the transaction is
/// rolled back and the puzzle stays unsolved.
pub async fn verify_guess(
    store: &Store,
    id: PuzzleId,
    guess: &str,
) -> Result<VerifyOutcome, ApiError> {
    if guess.trim().is_empty() {
        return Err(ApiError::InvalidArgument("guess is required".into()));
    }

    let puzzle = published_puzzle(store, id).await?;

    if !puzzle.is_correct_guess(guess) {
        let counted = store
            .transaction(|data| -> Result<(), StoreError> {
                if let Some(puzzle) = data.puzzles.get_mut(&id) {
                    puzzle.record_wrong_attempt();
                }
                Ok(())
            })
            .await;
        if let Err(err) = counted {
            warn!(puzzle_id = id, error = %err, "could not record wrong attempt");
        }
        debug!(puzzle_id = id, "incorrect guess");
        return Err(ApiError::IncorrectAnswer);
    }

    let now = now_millis();
    let outcome = store
        .transaction(|data| -> Result<VerifyOutcome, ApiError> {
            let puzzle = data
                .puzzles
                .get_mut(&id)
                .ok_or_else(|| not_found("puzzle", id))?;
            match puzzle.try_solve(now) {
                SolveTransition::FirstSolver => Ok(puzzle.reward()?),
                SolveTransition::AlreadySolved => Ok(VerifyOutcome::AlreadySolved),
            }
        })
        .await?;

    if outcome.is_reward() {
        info!(puzzle_id = id, "puzzle solved");
    } else {
        debug!(puzzle_id = id, "correct guess on an already solved puzzle");
    }
    Ok(outcome)
}

pub async fn get_solved_answer(store: &Store, id: PuzzleId) -> Result<String, ApiError> {
    let puzzle = published_puzzle(store, id).await?;
    Ok(puzzle.solved_answer()?.to_string())
}

pub async fn set_solver_name(
    store: &Store,
    id: PuzzleId,
    name: &str,
) -> Result<PublicPuzzle, ApiError> {
    store
        .transaction(|data| -> Result<PublicPuzzle, ApiError> {
            let puzzle = data
                .puzzles
                .get_mut(&id)
                .filter(|p| p.is_published)
                .ok_or_else(|| not_found("puzzle", id))?;
            puzzle.set_solver_name(name)?;
            Ok(puzzle.public_view())
        })
        .await
}

pub async fn list_published(store: &Store) -> Vec<PublicPuzzle> {
    store
        .read(|data| {
            data.puzzles
                .values()
                .filter(|p| p.is_published)
                .map(Puzzle::public_view)
                .collect()
        })
        .await
}

async fn published_puzzle(store: &Store, id: PuzzleId) -> Result<Puzzle, ApiError> {
    store
        .read(|data| data.puzzles.get(&id).filter(|p| p.is_published).cloned())
        .await
        .ok_or_else(|| not_found("puzzle", id))
}

async fn list_puzzles(State(state): State<AppState>) -> Json<Vec<PublicPuzzle>> {
    Json(list_published(state.store()).await)
}

async fn get_puzzle(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PuzzleId>,
) -> Result<Json<PublicPuzzle>, ApiError> {
    let puzzle = published_puzzle(state.store(), id).await?;
    Ok(Json(puzzle.public_view()))
}

async fn verify(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PuzzleId>,
    ApiJson(payload): ApiJson<VerifyRequest>,
) -> Result<Json<VerifyOutcome>, ApiError> {
    verify_guess(state.store(), id, &payload.guess).await.map(Json)
}

async fn solved_answer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PuzzleId>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let answer = get_solved_answer(state.store(), id).await?;
    Ok(Json(AnswerResponse { answer }))
}

async fn set_solver(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PuzzleId>,
    ApiJson(payload): ApiJson<SolverRequest>,
) -> Result<Json<PublicPuzzle>, ApiError> {
    set_solver_name(state.store(), id, &payload.name).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_puzzle, seeded_store};
    use puzzle_core::RewardType;

    async fn stored(store: &Store, id: PuzzleId) -> Puzzle {
        store
            .read(|data| data.puzzles.get(&id).cloned())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_correct_guess_gets_reward_then_already_solved() {
        let store = seeded_store(vec![sample_puzzle(7, "Orion", RewardType::Text)]);

        let outcome = verify_guess(&store, 7, " orion ").await.unwrap();
        assert_eq!(
            outcome,
            VerifyOutcome::Text {
                reveal_text: "Congrats!".into()
            }
        );

        let again = verify_guess(&store, 7, "ORION").await.unwrap();
        assert_eq!(again, VerifyOutcome::AlreadySolved);

        let puzzle = stored(&store, 7).await;
        assert!(puzzle.is_solved);
        assert!(puzzle.solved_at.is_some());
    }

    #[tokio::test]
    async fn wrong_guess_counts_attempt_and_stays_unsolved() {
        let mut puzzle = sample_puzzle(3, "alpha", RewardType::Text);
        puzzle.wrong_attempts = 2;
        let store = seeded_store(vec![puzzle]);

        let err = verify_guess(&store, 3, "beta").await.unwrap_err();
        assert!(matches!(err, ApiError::IncorrectAnswer));

        let puzzle = stored(&store, 3).await;
        assert_eq!(puzzle.wrong_attempts, 3);
        assert!(!puzzle.is_solved);
    }

    #[tokio::test]
    async fn wrong_guess_on_solved_puzzle_still_counts() {
        let mut puzzle = sample_puzzle(3, "alpha", RewardType::Text);
        puzzle.try_solve(1);
        let store = seeded_store(vec![puzzle]);

        let err = verify_guess(&store, 3, "beta").await.unwrap_err();
        assert!(matches!(err, ApiError::IncorrectAnswer));
        let puzzle = stored(&store, 3).await;
        assert_eq!(puzzle.wrong_attempts, 1);
        assert!(puzzle.is_solved);
    }

    #[tokio::test]
    async fn reward_matches_type_for_every_kind() {
        let store = seeded_store(vec![
            sample_puzzle(1, "a", RewardType::Metamask),
            sample_puzzle(2, "b", RewardType::Image),
            sample_puzzle(3, "c", RewardType::Text),
        ]);

        assert!(matches!(
            verify_guess(&store, 1, "a").await.unwrap(),
            VerifyOutcome::Metamask { .. }
        ));
        assert!(matches!(
            verify_guess(&store, 2, "b").await.unwrap(),
            VerifyOutcome::Image { .. }
        ));
        assert!(matches!(
            verify_guess(&store, 3, "c").await.unwrap(),
            VerifyOutcome::Text { .. }
        ));
    }

    #[tokio::test]
    async fn missing_or_blank_guess_and_unknown_puzzle() {
        let store = seeded_store(vec![sample_puzzle(1, "a", RewardType::Text)]);
        assert!(matches!(
            verify_guess(&store, 1, "   ").await.unwrap_err(),
            ApiError::InvalidArgument(_)
        ));
        assert!(matches!(
            verify_guess(&store, 99, "a").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert_eq!(stored(&store, 1).await.wrong_attempts, 0);
    }

    #[tokio::test]
    async fn unpublished_puzzle_is_not_found() {
        let mut puzzle = sample_puzzle(1, "a", RewardType::Text);
        puzzle.is_published = false;
        let store = seeded_store(vec![puzzle]);
        assert!(matches!(
            verify_guess(&store, 1, "a").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(list_published(&store).await.is_empty());
    }

    #[tokio::test]
    async fn misconfigured_reward_rolls_back_solve() {
        let mut puzzle = sample_puzzle(1, "a", RewardType::Image);
        puzzle.reveal_image_url = None;
        let store = seeded_store(vec![puzzle]);

        let err = verify_guess(&store, 1, "a").await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(!stored(&store, 1).await.is_solved);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_correct_guesses_have_exactly_one_winner() {
        let store = seeded_store(vec![sample_puzzle(7, "Orion", RewardType::Metamask)]);

        let attempts = (0..32).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { verify_guess(&store, 7, "orion").await })
        });
        let outcomes: Vec<VerifyOutcome> = futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let winners = outcomes.iter().filter(|o| o.is_reward()).count();
        let already = outcomes
            .iter()
            .filter(|o| **o == VerifyOutcome::AlreadySolved)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(already, 31);
        assert!(stored(&store, 7).await.is_solved);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_wrong_guesses_lose_no_updates() {
        let store = seeded_store(vec![sample_puzzle(3, "alpha", RewardType::Text)]);

        let attempts = (0..25).map(|i| {
            let store = store.clone();
            tokio::spawn(async move { verify_guess(&store, 3, &format!("wrong-{i}")).await })
        });
        for joined in futures::future::join_all(attempts).await {
            assert!(matches!(joined.unwrap(), Err(ApiError::IncorrectAnswer)));
        }
        assert_eq!(stored(&store, 3).await.wrong_attempts, 25);
    }

    #[tokio::test]
    async fn unpersisted_wrong_attempt_still_reports_incorrect_answer() {
        let path = std::env::temp_dir()
            .join(format!("missing_dir_{}", uuid::Uuid::new_v4()))
            .join("store.json");
        let mut data = crate::store::Collections::default();
        data.puzzles
            .insert(3, sample_puzzle(3, "alpha", RewardType::Text));
        let store = Store::from_collections(data, Some(path));

        let err = verify_guess(&store, 3, "beta").await.unwrap_err();
        assert!(matches!(err, ApiError::IncorrectAnswer));
    }

    #[tokio::test]
    async fn solved_answer_only_after_solve() {
        let store = seeded_store(vec![sample_puzzle(1, "Secret", RewardType::Text)]);
        assert!(matches!(
            get_solved_answer(&store, 1).await.unwrap_err(),
            ApiError::PermissionDenied(_)
        ));
        verify_guess(&store, 1, "secret").await.unwrap();
        assert_eq!(get_solved_answer(&store, 1).await.unwrap(), "Secret");
    }

    #[tokio::test]
    async fn solver_name_set_once_after_solve() {
        let store = seeded_store(vec![sample_puzzle(1, "a", RewardType::Text)]);
        assert!(matches!(
            set_solver_name(&store, 1, "ann").await.unwrap_err(),
            ApiError::PermissionDenied(_)
        ));
        verify_guess(&store, 1, "a").await.unwrap();
        let view = set_solver_name(&store, 1, " ann ").await.unwrap();
        assert_eq!(view.solver_name.as_deref(), Some("ann"));
        assert!(matches!(
            set_solver_name(&store, 1, "bob").await.unwrap_err(),
            ApiError::Conflict(_)
        ));
    }
}
