use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{QuizError, Result};

/// Milliseconds since the Unix epoch, used for all wire-visible timestamps.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate an opaque entity identifier.
pub fn generate_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub choice_text: String,
    pub is_correct: bool,
    pub order_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Seconds players have to answer
    pub time_limit: u32,
    pub points: u32,
    pub order_index: u32,
    pub choices: Vec<Choice>,
}

impl Question {
    pub fn correct_choice_id(&self) -> Option<&str> {
        self.choices
            .iter()
            .find(|c| c.is_correct)
            .map(|c| c.id.as_str())
    }

    pub fn choice(&self, choice_id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }
}

/// Immutable quiz definition. Shared into rooms as `Arc<Quiz>` so no game
/// can observe a quiz changing mid-session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: u64,
    pub is_active: bool,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: u64,
    pub is_active: bool,
    pub question_count: usize,
}

// --- creation payloads ---

fn default_time_limit() -> u32 {
    30
}

fn default_points() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceCreate {
    pub choice_text: String,
    #[serde(default)]
    pub is_correct: bool,
    pub order_index: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionCreate {
    pub question_text: String,
    #[serde(default = "QuestionCreate::default_type")]
    pub question_type: QuestionType,
    #[serde(default = "default_time_limit")]
    pub time_limit: u32,
    #[serde(default = "default_points")]
    pub points: u32,
    pub order_index: u32,
    pub choices: Vec<ChoiceCreate>,
}

impl QuestionCreate {
    fn default_type() -> QuestionType {
        QuestionType::MultipleChoice
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizCreate {
    pub title: String,
    pub description: Option<String>,
    pub created_by: String,
    pub questions: Vec<QuestionCreate>,
}

/// In-memory quiz definition store.
pub struct QuizStore {
    quizzes: Arc<RwLock<HashMap<String, Arc<Quiz>>>>,
}

impl QuizStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            quizzes: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Create a quiz after validating every question's choice set.
    pub async fn create_quiz(&self, data: QuizCreate) -> Result<Arc<Quiz>> {
        if data.title.trim().is_empty() {
            return Err(QuizError::InvalidQuiz("Title must not be empty".into()));
        }
        if data.questions.is_empty() {
            return Err(QuizError::InvalidQuiz(
                "Quiz must contain at least one question".into(),
            ));
        }

        let mut questions = Vec::with_capacity(data.questions.len());
        for q_data in data.questions {
            validate_choices(&q_data)?;

            let choices = q_data
                .choices
                .into_iter()
                .map(|c| Choice {
                    id: generate_id(),
                    choice_text: c.choice_text,
                    is_correct: c.is_correct,
                    order_index: c.order_index,
                })
                .collect();

            questions.push(Question {
                id: generate_id(),
                question_text: q_data.question_text,
                question_type: q_data.question_type,
                time_limit: q_data.time_limit.max(1),
                points: q_data.points,
                order_index: q_data.order_index,
                choices,
            });
        }
        questions.sort_by_key(|q| q.order_index);

        let quiz = Arc::new(Quiz {
            id: generate_id(),
            title: data.title,
            description: data.description,
            created_by: data.created_by,
            created_at: now_millis(),
            is_active: true,
            questions,
        });

        let mut quizzes = self.quizzes.write().await;
        quizzes.insert(quiz.id.clone(), quiz.clone());

        tracing::info!(quiz_id = %quiz.id, title = %quiz.title, "Quiz created");
        Ok(quiz)
    }

    pub async fn get_quiz(&self, quiz_id: &str) -> Result<Arc<Quiz>> {
        let quizzes = self.quizzes.read().await;
        quizzes
            .get(quiz_id)
            .cloned()
            .ok_or_else(|| QuizError::QuizNotFound(quiz_id.to_string()))
    }

    /// List active quizzes, newest first.
    pub async fn list_active_quizzes(&self, limit: usize) -> Vec<QuizSummary> {
        let quizzes = self.quizzes.read().await;
        let mut summaries: Vec<QuizSummary> = quizzes
            .values()
            .filter(|q| q.is_active)
            .map(|q| QuizSummary {
                id: q.id.clone(),
                title: q.title.clone(),
                description: q.description.clone(),
                created_by: q.created_by.clone(),
                created_at: q.created_at,
                is_active: q.is_active,
                question_count: q.questions.len(),
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries.truncate(limit);
        summaries
    }
}

fn validate_choices(question: &QuestionCreate) -> Result<()> {
    if question.choices.len() < 2 {
        return Err(QuizError::InvalidQuiz(
            "At least 2 choices required per question".into(),
        ));
    }
    if question.choices.len() > 4 {
        return Err(QuizError::InvalidQuiz(
            "Maximum 4 choices allowed per question".into(),
        ));
    }

    let correct_count = question.choices.iter().filter(|c| c.is_correct).count();
    if correct_count != 1 {
        return Err(QuizError::InvalidQuiz(format!(
            "Exactly one correct choice required, found {}",
            correct_count
        )));
    }

    Ok(())
}
