use thiserror::Error;

/// Custom error types for the quiz game server
#[derive(Debug, Error)]
pub enum QuizError {
    /// Resource resolution errors
    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Quiz {0} not found")]
    QuizNotFound(String),

    #[error("Player {0} not found")]
    PlayerNotFound(String),

    #[error("Question {0} not found")]
    QuestionNotFound(String),

    /// Game state errors
    #[error("Cannot {operation} in state '{current}'. Required state: '{required}'")]
    InvalidState {
        operation: String,
        current: String,
        required: String,
    },

    /// Room capacity errors
    #[error("Room {room_code} is full (max {max_players} players)")]
    RoomFull { room_code: String, max_players: usize },

    /// Conflict errors
    #[error("Player {player_id} already exists in room {room_code}")]
    DuplicatePlayer { player_id: String, room_code: String },

    #[error("Player {player_id} has already answered question {question_id}")]
    DuplicateAnswer { player_id: String, question_id: String },

    /// Answer validation errors
    #[error("Invalid answer from player {player_id} for question {question_id}: {reason}")]
    InvalidAnswer {
        reason: String,
        player_id: String,
        question_id: String,
    },

    #[error("Invalid quiz definition: {0}")]
    InvalidQuiz(String),

    /// Authorization errors
    #[error("Not authorized to {action} {resource}")]
    Unauthorized { action: String, resource: String },

    /// Signaling errors
    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Generic errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience type alias for Results using QuizError
pub type Result<T> = std::result::Result<T, QuizError>;

impl QuizError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        QuizError::Internal(msg.into())
    }

    /// Helper to create InvalidState errors
    pub fn invalid_state(
        operation: impl Into<String>,
        current: impl Into<String>,
        required: impl Into<String>,
    ) -> Self {
        QuizError::InvalidState {
            operation: operation.into(),
            current: current.into(),
            required: required.into(),
        }
    }

    /// Helper to create Unauthorized errors
    pub fn unauthorized(action: impl Into<String>, resource: impl Into<String>) -> Self {
        QuizError::Unauthorized {
            action: action.into(),
            resource: resource.into(),
        }
    }

    /// Stable error code, exposed over HTTP and in `error` events
    pub fn code(&self) -> &'static str {
        match self {
            QuizError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            QuizError::QuizNotFound(_) => "QUIZ_NOT_FOUND",
            QuizError::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            QuizError::QuestionNotFound(_) => "QUESTION_NOT_FOUND",
            QuizError::InvalidState { .. } => "INVALID_GAME_STATE",
            QuizError::RoomFull { .. } => "ROOM_FULL",
            QuizError::DuplicatePlayer { .. } => "DUPLICATE_PLAYER",
            QuizError::DuplicateAnswer { .. } => "DUPLICATE_ANSWER",
            QuizError::InvalidAnswer { .. } => "INVALID_ANSWER",
            QuizError::InvalidQuiz(_) => "INVALID_QUIZ",
            QuizError::Unauthorized { .. } => "UNAUTHORIZED",
            QuizError::SerializationFailed(_) => "SERIALIZATION_ERROR",
            QuizError::Internal(_) | QuizError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for the management layer
    pub fn http_status(&self) -> u16 {
        match self {
            QuizError::RoomNotFound(_)
            | QuizError::QuizNotFound(_)
            | QuizError::PlayerNotFound(_)
            | QuizError::QuestionNotFound(_) => 404,
            QuizError::InvalidState { .. }
            | QuizError::InvalidAnswer { .. }
            | QuizError::InvalidQuiz(_) => 400,
            QuizError::RoomFull { .. }
            | QuizError::DuplicatePlayer { .. }
            | QuizError::DuplicateAnswer { .. } => 409,
            QuizError::Unauthorized { .. } => 403,
            QuizError::SerializationFailed(_) | QuizError::Internal(_) | QuizError::Other(_) => {
                500
            }
        }
    }
}
