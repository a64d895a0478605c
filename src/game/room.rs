use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::error::{QuizError, Result};
use crate::game::scoring::{calculate_score, generate_room_code, sanitize_nickname};
use crate::store::{now_millis, Quiz};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Completed,
    Cancelled,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Active => "active",
            GameStatus::Completed => "completed",
            GameStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states have no outbound transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub player_id: String,
    pub nickname: String,
    pub joined_at: u64,
    pub join_order: usize,
    pub is_connected: bool,
    pub total_score: u32,
}

/// Immutable once recorded.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub player_id: String,
    pub question_id: String,
    pub choice_id: String,
    pub response_time: Option<f64>,
    pub is_correct: bool,
    pub points_earned: u32,
    pub answered_at: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub is_correct: bool,
    pub points_earned: u32,
    pub correct_choice_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the question at this index.
    NextQuestion(usize),
    /// Was on the last question; the room is now completed.
    GameCompleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerScore {
    pub player_id: String,
    pub nickname: String,
    pub total_score: u32,
    pub rank: usize,
    pub is_connected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    pub players: Vec<PlayerScore>,
    pub total_players: usize,
    pub last_updated: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionStats {
    pub question_id: String,
    pub total_answers: usize,
    pub correct_answers: usize,
    pub average_response_time: f64,
    /// choice id -> number of players who picked it
    pub choice_distribution: HashMap<String, usize>,
}

/// Mutable game-session state. All mutation happens behind the owning
/// room's mutex; methods here are synchronous and assume the caller holds
/// that lock, which is what makes every operation atomic per room.
#[derive(Debug)]
pub struct RoomState {
    pub status: GameStatus,
    pub current_question: usize,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    /// When the current question was put in front of players; the basis
    /// reconnecting clients use to resynchronize their countdowns.
    pub question_started_at: Option<u64>,
    players: HashMap<String, Player>,
    answers: HashMap<(String, String), AnswerRecord>,
    next_join_order: usize,
}

impl RoomState {
    fn new() -> Self {
        Self {
            status: GameStatus::Waiting,
            current_question: 0,
            started_at: None,
            ended_at: None,
            question_started_at: None,
            players: HashMap::new(),
            answers: HashMap::new(),
            next_join_order: 0,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Players currently marked connected. Join/leave notifications carry
    /// this count, so it drops when a player's socket goes away even
    /// though the membership record is retained for reconnection.
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.is_connected).count()
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Transition `waiting -> active` and point at the first question.
    pub fn start(&mut self, quiz: &Quiz) -> Result<usize> {
        if self.status != GameStatus::Waiting {
            return Err(QuizError::invalid_state(
                "start game",
                self.status.as_str(),
                "waiting",
            ));
        }
        if quiz.questions.is_empty() {
            return Err(QuizError::InvalidQuiz("Quiz has no questions".into()));
        }

        self.status = GameStatus::Active;
        self.started_at = Some(now_millis());
        self.current_question = 0;
        self.question_started_at = Some(now_millis());
        Ok(0)
    }

    /// Advance to the next question or complete the game when the current
    /// question is the last one.
    pub fn advance(&mut self, quiz: &Quiz) -> Result<AdvanceOutcome> {
        if self.status != GameStatus::Active {
            return Err(QuizError::invalid_state(
                "advance question",
                self.status.as_str(),
                "active",
            ));
        }

        if self.current_question >= quiz.questions.len().saturating_sub(1) {
            self.status = GameStatus::Completed;
            self.ended_at = Some(now_millis());
            self.question_started_at = None;
            Ok(AdvanceOutcome::GameCompleted)
        } else {
            self.current_question += 1;
            self.question_started_at = Some(now_millis());
            Ok(AdvanceOutcome::NextQuestion(self.current_question))
        }
    }

    /// Force-complete from `waiting` or `active`.
    pub fn end(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(QuizError::invalid_state(
                "end game",
                self.status.as_str(),
                "waiting or active",
            ));
        }

        self.status = GameStatus::Completed;
        self.ended_at = Some(now_millis());
        self.question_started_at = None;
        Ok(())
    }

    /// Cancel from any non-terminal state.
    pub fn cancel(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(QuizError::invalid_state(
                "cancel game",
                self.status.as_str(),
                "waiting or active",
            ));
        }

        self.status = GameStatus::Cancelled;
        self.ended_at = Some(now_millis());
        self.question_started_at = None;
        Ok(())
    }

    /// Add a player, enforcing capacity and player-id uniqueness. Nickname
    /// collisions get a deterministic `#n` suffix rather than a rejection.
    pub fn join(
        &mut self,
        room_code: &str,
        max_players: usize,
        player_id: &str,
        nickname: &str,
    ) -> Result<Player> {
        if self.status.is_terminal() {
            return Err(QuizError::invalid_state(
                "join room",
                self.status.as_str(),
                "waiting or active",
            ));
        }
        if self.players.len() >= max_players {
            return Err(QuizError::RoomFull {
                room_code: room_code.to_string(),
                max_players,
            });
        }
        if self.players.contains_key(player_id) {
            return Err(QuizError::DuplicatePlayer {
                player_id: player_id.to_string(),
                room_code: room_code.to_string(),
            });
        }

        let nickname = self.dedupe_nickname(sanitize_nickname(nickname));
        let player = Player {
            player_id: player_id.to_string(),
            nickname,
            joined_at: now_millis(),
            join_order: self.next_join_order,
            is_connected: true,
            total_score: 0,
        };
        self.next_join_order += 1;
        self.players.insert(player_id.to_string(), player.clone());
        Ok(player)
    }

    fn dedupe_nickname(&self, base: String) -> String {
        let taken = |name: &str| self.players.values().any(|p| p.nickname == name);
        if !taken(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}#{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Admit and score an answer for the current question. The duplicate
    /// check and the insert happen under the same room lock, so two racing
    /// submissions cannot both pass.
    pub fn submit(
        &mut self,
        quiz: &Quiz,
        player_id: &str,
        question_id: &str,
        choice_id: &str,
        response_time: Option<f64>,
    ) -> Result<AnswerResult> {
        if self.status != GameStatus::Active {
            return Err(QuizError::invalid_state(
                "submit answer",
                self.status.as_str(),
                "active",
            ));
        }

        let player = self
            .players
            .get(player_id)
            .ok_or_else(|| QuizError::PlayerNotFound(player_id.to_string()))?
            .clone();

        let question = &quiz.questions[self.current_question];
        if question.id != question_id {
            return Err(QuizError::InvalidAnswer {
                reason: "Question is not the room's current question".into(),
                player_id: player_id.to_string(),
                question_id: question_id.to_string(),
            });
        }

        let key = (player_id.to_string(), question_id.to_string());
        if self.answers.contains_key(&key) {
            return Err(QuizError::DuplicateAnswer {
                player_id: player_id.to_string(),
                question_id: question_id.to_string(),
            });
        }

        let choice = question.choice(choice_id).ok_or_else(|| QuizError::InvalidAnswer {
            reason: "Choice does not belong to this question".into(),
            player_id: player_id.to_string(),
            question_id: question_id.to_string(),
        })?;

        let is_correct = choice.is_correct;
        let points_earned =
            calculate_score(question.points, is_correct, response_time, question.time_limit);

        // Record answer and update the running total together; both are
        // behind the same lock so neither can be observed without the other.
        self.answers.insert(
            key,
            AnswerRecord {
                player_id: player_id.to_string(),
                question_id: question_id.to_string(),
                choice_id: choice_id.to_string(),
                response_time,
                is_correct,
                points_earned,
                answered_at: now_millis(),
            },
        );
        if let Some(p) = self.players.get_mut(&player.player_id) {
            p.total_score += points_earned;
        }

        Ok(AnswerResult {
            is_correct,
            points_earned,
            correct_choice_id: question.correct_choice_id().map(|s| s.to_string()),
        })
    }

    /// Ranked standings: score descending, ties broken by join order, with
    /// dense 1-based ranks (equal scores share a rank).
    pub fn leaderboard(&self) -> Leaderboard {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then(a.join_order.cmp(&b.join_order))
        });

        let mut scores = Vec::with_capacity(players.len());
        let mut rank = 0;
        let mut last_score = None;
        for player in players {
            if last_score != Some(player.total_score) {
                rank += 1;
                last_score = Some(player.total_score);
            }
            scores.push(PlayerScore {
                player_id: player.player_id.clone(),
                nickname: player.nickname.clone(),
                total_score: player.total_score,
                rank,
                is_connected: player.is_connected,
            });
        }

        Leaderboard {
            total_players: scores.len(),
            players: scores,
            last_updated: now_millis(),
        }
    }

    /// Per-question statistics derived by scanning recorded answers.
    pub fn question_stats(&self, quiz: &Quiz, question_id: &str) -> Result<QuestionStats> {
        if !quiz.questions.iter().any(|q| q.id == question_id) {
            return Err(QuizError::QuestionNotFound(question_id.to_string()));
        }

        let answers: Vec<&AnswerRecord> = self
            .answers
            .values()
            .filter(|a| a.question_id == question_id)
            .collect();

        let total_answers = answers.len();
        let correct_answers = answers.iter().filter(|a| a.is_correct).count();

        let timed: Vec<f64> = answers.iter().filter_map(|a| a.response_time).collect();
        let average_response_time = if timed.is_empty() {
            0.0
        } else {
            timed.iter().sum::<f64>() / timed.len() as f64
        };

        let mut choice_distribution: HashMap<String, usize> = HashMap::new();
        for answer in &answers {
            *choice_distribution.entry(answer.choice_id.clone()).or_insert(0) += 1;
        }

        Ok(QuestionStats {
            question_id: question_id.to_string(),
            total_answers,
            correct_answers,
            average_response_time,
            choice_distribution,
        })
    }

    /// Seconds left on the current question's countdown, for reconnecting
    /// clients. `None` when no question is live.
    pub fn remaining_time(&self, quiz: &Quiz) -> Option<u32> {
        if self.status != GameStatus::Active {
            return None;
        }
        let started = self.question_started_at?;
        let limit = quiz.questions.get(self.current_question)?.time_limit;
        let elapsed_secs = now_millis().saturating_sub(started) / 1000;
        Some(limit.saturating_sub(elapsed_secs as u32))
    }

    /// Flip the connectivity flag, returning the player's nickname.
    pub fn set_connected(&mut self, player_id: &str, connected: bool) -> Option<String> {
        self.players.get_mut(player_id).map(|p| {
            p.is_connected = connected;
            p.nickname.clone()
        })
    }
}

/// One game session: immutable identity plus mutex-guarded state.
#[derive(Debug)]
pub struct GameRoom {
    pub code: String,
    pub quiz: Arc<Quiz>,
    pub host_id: String,
    pub host_name: String,
    pub max_players: usize,
    pub created_at: u64,
    state: Mutex<RoomState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub room_code: String,
    pub quiz_id: String,
    pub host_id: String,
    pub host_name: String,
    pub status: GameStatus,
    pub current_question: usize,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub max_players: usize,
    pub player_count: usize,
}

impl GameRoom {
    /// Lock this room's state. Held across a full command (mutation plus
    /// event enqueue) to give single-threaded-per-room semantics; event
    /// delivery itself happens on per-connection writer tasks.
    pub async fn state(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    pub async fn info(&self) -> RoomInfo {
        let state = self.state.lock().await;
        RoomInfo {
            room_code: self.code.clone(),
            quiz_id: self.quiz.id.clone(),
            host_id: self.host_id.clone(),
            host_name: self.host_name.clone(),
            status: state.status,
            current_question: state.current_question,
            created_at: self.created_at,
            started_at: state.started_at,
            ended_at: state.ended_at,
            max_players: self.max_players,
            player_count: state.player_count(),
        }
    }
}

/// Owns every live game session, keyed by room code. Rooms are independent:
/// each carries its own lock, so operations on different rooms never
/// serialize against each other.
pub struct RoomManager {
    rooms: Arc<RwLock<HashMap<String, Arc<GameRoom>>>>,
    code_length: usize,
}

impl RoomManager {
    pub fn new(code_length: usize) -> Arc<Self> {
        Arc::new(Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            code_length,
        })
    }

    pub async fn create_room(
        &self,
        quiz: Arc<Quiz>,
        host_id: String,
        host_name: String,
        max_players: usize,
    ) -> Result<Arc<GameRoom>> {
        let mut rooms = self.rooms.write().await;

        // Regenerate on collision against existing codes
        let mut code = generate_room_code(self.code_length);
        while rooms.contains_key(&code) {
            code = generate_room_code(self.code_length);
        }

        let room = Arc::new(GameRoom {
            code: code.clone(),
            quiz,
            host_id,
            host_name,
            max_players,
            created_at: now_millis(),
            state: Mutex::new(RoomState::new()),
        });
        rooms.insert(code.clone(), room.clone());

        tracing::info!(room_code = %code, quiz_id = %room.quiz.id, "Room created");
        Ok(room)
    }

    pub async fn get_room(&self, room_code: &str) -> Result<Arc<GameRoom>> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_code)
            .cloned()
            .ok_or_else(|| QuizError::RoomNotFound(room_code.to_string()))
    }

    /// Drop a room. Its players and answers live inside the room state, so
    /// removing the entry tears the whole aggregate down with it.
    pub async fn remove_room(&self, room_code: &str) -> Option<Arc<GameRoom>> {
        let mut rooms = self.rooms.write().await;
        let removed = rooms.remove(room_code);
        if removed.is_some() {
            tracing::info!(room_code = %room_code, "Room removed");
        }
        removed
    }

    pub async fn room_codes(&self) -> Vec<String> {
        let rooms = self.rooms.read().await;
        rooms.keys().cloned().collect()
    }

    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}
