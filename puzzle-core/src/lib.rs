use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PuzzleId = u64;

pub const SOLVER_NAME_MAX_CHARS: usize = 40;
const SEED_PHRASE_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Metamask,
    Image,
    Text,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Metamask => "metamask",
            RewardType::Image => "image",
            RewardType::Text => "text",
        }
    }
}

/// Stored puzzle record, secrets included. Never hand this to a public caller;
/// use [`Puzzle::public_view`] instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub id: PuzzleId,
    pub title: String,
    pub image_url: String,
    pub answer: String,
    pub is_solved: bool,
    pub wrong_attempts: u64,
    pub reward_type: RewardType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal_text: Option<String>,
    pub is_published: bool,
    #[serde(default)]
    pub solver_name: Option<String>,
    #[serde(default)]
    pub solved_at: Option<u64>,
    pub created_at: u64,
}

/// What a public caller may see of a puzzle. There are no reward fields here,
/// and `answer` is only filled once the puzzle is solved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicPuzzle {
    pub id: PuzzleId,
    pub title: String,
    pub image_url: String,
    pub reward_type: RewardType,
    pub is_solved: bool,
    pub wrong_attempts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub solver_name: Option<String>,
    pub solved_at: Option<u64>,
}

/// Result of a correct guess.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Metamask {
        #[serde(rename = "recoveryPhrase")]
        recovery_phrase: String,
    },
    Image {
        #[serde(rename = "revealImageUrl")]
        reveal_image_url: String,
    },
    Text {
        #[serde(rename = "revealText")]
        reveal_text: String,
    },
    AlreadySolved,
}

impl VerifyOutcome {
    pub fn is_reward(&self) -> bool {
        !matches!(self, VerifyOutcome::AlreadySolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveTransition {
    FirstSolver,
    AlreadySolved,
}

/// Admin-supplied puzzle content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PuzzleInput {
    pub id: PuzzleId,
    pub title: String,
    pub image_url: String,
    pub answer: String,
    pub reward_type: RewardType,
    #[serde(default)]
    pub recovery_phrase: Option<String>,
    #[serde(default)]
    pub reveal_image_url: Option<String>,
    #[serde(default)]
    pub reveal_text: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PuzzleError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("recovery phrase must have 12, 15, 18, 21 or 24 words, got {0}")]
    InvalidRecoveryPhrase(usize),
    #[error("solver name must be 1 to 40 characters")]
    InvalidSolverName,
    #[error("puzzle is not solved yet")]
    NotSolved,
    #[error("solver name already set")]
    SolverNameTaken,
    #[error("{} reward is not configured", .0.as_str())]
    RewardNotConfigured(RewardType),
}

pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl Puzzle {
    pub fn from_input(input: PuzzleInput, now: u64) -> Result<Self, PuzzleError> {
        let input = normalize_input(input)?;
        Ok(Self {
            id: input.id,
            title: input.title,
            image_url: input.image_url,
            answer: input.answer,
            is_solved: false,
            wrong_attempts: 0,
            reward_type: input.reward_type,
            recovery_phrase: input.recovery_phrase,
            reveal_image_url: input.reveal_image_url,
            reveal_text: input.reveal_text,
            is_published: input.is_published,
            solver_name: None,
            solved_at: None,
            created_at: now,
        })
    }

    /// Replaces the content fields. Solve state, counters and timestamps stay.
    pub fn apply_input(&mut self, input: PuzzleInput) -> Result<(), PuzzleError> {
        let input = normalize_input(input)?;
        self.title = input.title;
        self.image_url = input.image_url;
        self.answer = input.answer;
        self.reward_type = input.reward_type;
        self.recovery_phrase = input.recovery_phrase;
        self.reveal_image_url = input.reveal_image_url;
        self.reveal_text = input.reveal_text;
        self.is_published = input.is_published;
        Ok(())
    }

    pub fn is_correct_guess(&self, guess: &str) -> bool {
        normalize_answer(guess) == normalize_answer(&self.answer)
    }

    pub fn record_wrong_attempt(&mut self) {
        self.wrong_attempts = self.wrong_attempts.saturating_add(1);
    }

    /// Check-and-set of the solved flag. Must run inside a store transaction
    /// so that only one caller ever observes `FirstSolver`.
    pub fn try_solve(&mut self, now: u64) -> SolveTransition {
        if self.is_solved {
            return SolveTransition::AlreadySolved;
        }
        self.is_solved = true;
        self.solved_at = Some(now);
        SolveTransition::FirstSolver
    }

    /// The one sensitive field selected by `reward_type`.
    pub fn reward(&self) -> Result<VerifyOutcome, PuzzleError> {
        let missing = || PuzzleError::RewardNotConfigured(self.reward_type);
        let outcome = match self.reward_type {
            RewardType::Metamask => VerifyOutcome::Metamask {
                recovery_phrase: self.recovery_phrase.clone().ok_or_else(missing)?,
            },
            RewardType::Image => VerifyOutcome::Image {
                reveal_image_url: self.reveal_image_url.clone().ok_or_else(missing)?,
            },
            RewardType::Text => VerifyOutcome::Text {
                reveal_text: self.reveal_text.clone().ok_or_else(missing)?,
            },
        };
        Ok(outcome)
    }

    pub fn solved_answer(&self) -> Result<&str, PuzzleError> {
        if !self.is_solved {
            return Err(PuzzleError::NotSolved);
        }
        Ok(&self.answer)
    }

    pub fn set_solver_name(&mut self, name: &str) -> Result<(), PuzzleError> {
        if !self.is_solved {
            return Err(PuzzleError::NotSolved);
        }
        if self.solver_name.is_some() {
            return Err(PuzzleError::SolverNameTaken);
        }
        let name = name.trim();
        let len = name.chars().count();
        if len == 0 || len > SOLVER_NAME_MAX_CHARS {
            return Err(PuzzleError::InvalidSolverName);
        }
        self.solver_name = Some(name.to_string());
        Ok(())
    }

    /// Admin reset back to unsolved. The wrong-attempt counter is history and stays.
    pub fn reset(&mut self) {
        self.is_solved = false;
        self.solved_at = None;
        self.solver_name = None;
    }

    pub fn public_view(&self) -> PublicPuzzle {
        PublicPuzzle {
            id: self.id,
            title: self.title.clone(),
            image_url: self.image_url.clone(),
            reward_type: self.reward_type,
            is_solved: self.is_solved,
            wrong_attempts: self.wrong_attempts,
            answer: self.is_solved.then(|| self.answer.clone()),
            solver_name: self.solver_name.clone(),
            solved_at: self.solved_at,
        }
    }
}

fn normalize_input(input: PuzzleInput) -> Result<PuzzleInput, PuzzleError> {
    let title = required(&input.title, "title")?;
    let image_url = required(&input.image_url, "imageUrl")?;
    let answer = required(&input.answer, "answer")?;

    let (mut recovery_phrase, mut reveal_image_url, mut reveal_text) = (None, None, None);
    match input.reward_type {
        RewardType::Metamask => {
            let phrase = input
                .recovery_phrase
                .as_deref()
                .map(|p| p.split_whitespace().collect::<Vec<_>>())
                .filter(|words| !words.is_empty())
                .ok_or(PuzzleError::MissingField("recoveryPhrase"))?;
            if !SEED_PHRASE_WORD_COUNTS.contains(&phrase.len()) {
                return Err(PuzzleError::InvalidRecoveryPhrase(phrase.len()));
            }
            recovery_phrase = Some(phrase.join(" "));
        }
        RewardType::Image => {
            let url = input.reveal_image_url.as_deref().unwrap_or_default();
            reveal_image_url = Some(required(url, "revealImageUrl")?);
        }
        RewardType::Text => {
            let text = input.reveal_text.as_deref().unwrap_or_default();
            reveal_text = Some(required(text, "revealText")?);
        }
    }

    Ok(PuzzleInput {
        id: input.id,
        title,
        image_url,
        answer,
        reward_type: input.reward_type,
        recovery_phrase,
        reveal_image_url,
        reveal_text,
        is_published: input.is_published,
    })
}

fn required(value: &str, field: &'static str) -> Result<String, PuzzleError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PuzzleError::MissingField(field));
    }
    Ok(value.to_string())
}
