use std::sync::Arc;

use crate::error::QuizError;
use crate::game::messages::{GameStats, QuestionPublic, ServerEvent};
use crate::game::registry::ConnectionRegistry;
use crate::game::room::{AnswerResult, GameRoom, Leaderboard, QuestionStats};
use crate::store::now_millis;

/// Maps state-machine transitions and scoring outcomes to addressed
/// events and drives the registry to deliver them. Callers invoke these
/// while still holding the room's command lock, which is what gives the
/// per-room event ordering guarantee; the sends themselves are channel
/// writes, never network I/O.
pub struct EventDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// `start` success: everyone gets the first question.
    pub async fn game_started(&self, room: &GameRoom, question_index: usize) {
        let question = &room.quiz.questions[question_index];
        self.registry
            .broadcast(
                &room.code,
                &ServerEvent::QuestionStarted {
                    question: QuestionPublic::from(question),
                    question_number: question_index + 1,
                    total_questions: room.quiz.questions.len(),
                    remaining_time: None,
                },
            )
            .await;

        tracing::info!(room_code = %room.code, "Game started");
    }

    /// `advance` to another question: close out the previous question,
    /// then put the next one in front of everyone.
    pub async fn question_advanced(
        &self,
        room: &GameRoom,
        prev_stats: QuestionStats,
        prev_correct_choice: Option<String>,
        next_index: usize,
    ) {
        self.registry
            .broadcast(
                &room.code,
                &ServerEvent::QuestionEnded {
                    question_id: prev_stats.question_id.clone(),
                    results: prev_stats,
                    correct_choice_id: prev_correct_choice,
                },
            )
            .await;

        let question = &room.quiz.questions[next_index];
        self.registry
            .broadcast(
                &room.code,
                &ServerEvent::QuestionStarted {
                    question: QuestionPublic::from(question),
                    question_number: next_index + 1,
                    total_questions: room.quiz.questions.len(),
                    remaining_time: None,
                },
            )
            .await;

        tracing::info!(
            room_code = %room.code,
            question_number = next_index + 1,
            "Advanced to next question"
        );
    }

    /// Last question's results when `advance` runs off the end of the quiz.
    pub async fn question_ended(
        &self,
        room: &GameRoom,
        stats: QuestionStats,
        correct_choice: Option<String>,
    ) {
        self.registry
            .broadcast(
                &room.code,
                &ServerEvent::QuestionEnded {
                    question_id: stats.question_id.clone(),
                    results: stats,
                    correct_choice_id: correct_choice,
                },
            )
            .await;
    }

    /// Game completion, whether by running out of questions or manual end.
    pub async fn game_ended(
        &self,
        room: &GameRoom,
        final_leaderboard: Leaderboard,
        duration_ms: Option<u64>,
    ) {
        let game_stats = GameStats {
            total_questions: room.quiz.questions.len(),
            total_players: final_leaderboard.total_players,
            quiz_title: room.quiz.title.clone(),
            duration_ms,
        };

        self.registry
            .broadcast(
                &room.code,
                &ServerEvent::GameEnded {
                    final_leaderboard,
                    game_stats,
                },
            )
            .await;

        tracing::info!(room_code = %room.code, "Game ended");
    }

    /// `submit` success: result to the submitter, updated leaderboard to
    /// the whole room, submission details to the host, in that order.
    pub async fn answer_submitted(
        &self,
        room_code: &str,
        player_id: &str,
        nickname: &str,
        question_id: &str,
        result: &AnswerResult,
        leaderboard: Leaderboard,
    ) {
        self.registry
            .send_to_player(
                room_code,
                player_id,
                &ServerEvent::AnswerResult {
                    is_correct: result.is_correct,
                    points_earned: result.points_earned,
                    correct_choice_id: result.correct_choice_id.clone(),
                },
            )
            .await;

        self.registry
            .broadcast(room_code, &ServerEvent::LeaderboardUpdate { leaderboard })
            .await;

        self.registry
            .send_to_host(
                room_code,
                &ServerEvent::AnswerSubmitted {
                    player_id: player_id.to_string(),
                    nickname: nickname.to_string(),
                    question_id: question_id.to_string(),
                    is_correct: result.is_correct,
                    points_earned: result.points_earned,
                },
            )
            .await;
    }

    pub async fn player_joined(
        &self,
        room_code: &str,
        player_id: &str,
        nickname: &str,
        player_count: usize,
    ) {
        self.registry
            .broadcast(
                room_code,
                &ServerEvent::PlayerJoined {
                    player_id: player_id.to_string(),
                    nickname: nickname.to_string(),
                    player_count,
                    timestamp: now_millis(),
                },
            )
            .await;
    }

    pub async fn player_left(
        &self,
        room_code: &str,
        player_id: &str,
        nickname: &str,
        player_count: usize,
    ) {
        self.registry
            .broadcast(
                room_code,
                &ServerEvent::PlayerLeft {
                    player_id: player_id.to_string(),
                    nickname: nickname.to_string(),
                    player_count,
                    timestamp: now_millis(),
                },
            )
            .await;
    }

    pub async fn room_cancelled(&self, room_code: &str) {
        self.registry
            .broadcast(
                room_code,
                &ServerEvent::RoomCancelled {
                    room_code: room_code.to_string(),
                },
            )
            .await;
    }

    /// Host socket dropped. Players are warned but game state is left
    /// alone so a reconnecting host can resume.
    pub async fn host_disconnected(&self, room_code: &str) {
        self.registry
            .broadcast(
                room_code,
                &ServerEvent::Error {
                    message: "Host disconnected".to_string(),
                    error_code: "HOST_DISCONNECTED".to_string(),
                },
            )
            .await;
    }

    /// Rejections go only to the originating connection, never broadcast.
    pub async fn error_to_player(&self, room_code: &str, player_id: &str, err: &QuizError) {
        self.registry
            .send_to_player(room_code, player_id, &error_event(err))
            .await;
    }

    pub async fn error_to_host(&self, room_code: &str, err: &QuizError) {
        self.registry.send_to_host(room_code, &error_event(err)).await;
    }
}

fn error_event(err: &QuizError) -> ServerEvent {
    ServerEvent::Error {
        message: err.to_string(),
        error_code: err.code().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::RoomManager;
    use crate::store::test_support::sample_quiz_create;
    use crate::store::QuizStore;
    use tokio::sync::mpsc;
    use warp::ws::Message;

    async fn setup() -> (
        Arc<ConnectionRegistry>,
        EventDispatcher,
        Arc<crate::game::room::GameRoom>,
    ) {
        let quiz = QuizStore::new()
            .create_quiz(sample_quiz_create())
            .await
            .unwrap();
        let room = RoomManager::new(6)
            .create_room(quiz, "host-1".into(), "Host".into(), 50)
            .await
            .unwrap();
        let registry = ConnectionRegistry::new();
        let dispatcher = EventDispatcher::new(registry.clone());
        (registry, dispatcher, room)
    }

    fn event_type(msg: &Message) -> String {
        let value: serde_json::Value = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_game_started_broadcasts_sanitized_question() {
        let (registry, dispatcher, room) = setup().await;
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        registry.register_host(&room.code, host_tx).await;

        dispatcher.game_started(&room, 0).await;

        let msg = host_rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        assert_eq!(value["type"], "question_started");
        assert_eq!(value["data"]["question_number"], 1);
        assert_eq!(value["data"]["total_questions"], 2);
        for choice in value["data"]["question"]["choices"].as_array().unwrap() {
            assert!(choice.get("is_correct").is_none());
        }
    }

    #[tokio::test]
    async fn test_advance_emits_results_then_next_question() {
        let (registry, dispatcher, room) = setup().await;
        let (player_tx, mut player_rx) = mpsc::unbounded_channel();
        registry
            .register_player(&room.code, "p1", "Alice", player_tx)
            .await;

        let stats = {
            let mut state = room.state().await;
            state.join(&room.code, 50, "p1", "Alice").unwrap();
            state.start(&room.quiz).unwrap();
            state
                .question_stats(&room.quiz, &room.quiz.questions[0].id)
                .unwrap()
        };
        let correct = room.quiz.questions[0].correct_choice_id().map(String::from);

        dispatcher.question_advanced(&room, stats, correct, 1).await;

        assert_eq!(event_type(&player_rx.try_recv().unwrap()), "question_ended");
        assert_eq!(event_type(&player_rx.try_recv().unwrap()), "question_started");
    }

    #[tokio::test]
    async fn test_answer_submitted_event_order_and_audience() {
        let (registry, dispatcher, room) = setup().await;
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (p1_tx, mut p1_rx) = mpsc::unbounded_channel();
        let (p2_tx, mut p2_rx) = mpsc::unbounded_channel();
        registry.register_host(&room.code, host_tx).await;
        registry.register_player(&room.code, "p1", "Alice", p1_tx).await;
        registry.register_player(&room.code, "p2", "Bob", p2_tx).await;

        let (result, leaderboard) = {
            let mut state = room.state().await;
            state.join(&room.code, 50, "p1", "Alice").unwrap();
            state.join(&room.code, 50, "p2", "Bob").unwrap();
            state.start(&room.quiz).unwrap();
            let question = &room.quiz.questions[0];
            let result = state
                .submit(
                    &room.quiz,
                    "p1",
                    &question.id,
                    question.correct_choice_id().unwrap(),
                    Some(0.0),
                )
                .unwrap();
            (result, state.leaderboard())
        };

        dispatcher
            .answer_submitted(
                &room.code,
                "p1",
                "Alice",
                &room.quiz.questions[0].id,
                &result,
                leaderboard,
            )
            .await;

        // Submitter: private result first, then the broadcast leaderboard
        assert_eq!(event_type(&p1_rx.try_recv().unwrap()), "answer_result");
        assert_eq!(event_type(&p1_rx.try_recv().unwrap()), "leaderboard_update");
        assert!(p1_rx.try_recv().is_err());

        // Other players: only the leaderboard
        assert_eq!(event_type(&p2_rx.try_recv().unwrap()), "leaderboard_update");
        assert!(p2_rx.try_recv().is_err());

        // Host: broadcast leaderboard, then the host-only submission detail
        assert_eq!(event_type(&host_rx.try_recv().unwrap()), "leaderboard_update");
        let host_msg = host_rx.try_recv().unwrap();
        let value: serde_json::Value =
            serde_json::from_str(host_msg.to_str().unwrap()).unwrap();
        assert_eq!(value["type"], "answer_submitted");
        assert_eq!(value["data"]["player_id"], "p1");
        assert_eq!(value["data"]["points_earned"], 120);
    }

    #[tokio::test]
    async fn test_errors_go_only_to_originating_connection() {
        let (registry, dispatcher, room) = setup().await;
        let (p1_tx, mut p1_rx) = mpsc::unbounded_channel();
        let (p2_tx, mut p2_rx) = mpsc::unbounded_channel();
        registry.register_player(&room.code, "p1", "Alice", p1_tx).await;
        registry.register_player(&room.code, "p2", "Bob", p2_tx).await;

        let err = QuizError::DuplicateAnswer {
            player_id: "p1".into(),
            question_id: "q1".into(),
        };
        dispatcher.error_to_player(&room.code, "p1", &err).await;

        let msg = p1_rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["error_code"], "DUPLICATE_ANSWER");
        assert!(p2_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_player_joined_broadcast() {
        let (registry, dispatcher, room) = setup().await;
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        registry.register_host(&room.code, host_tx).await;

        dispatcher.player_joined(&room.code, "p1", "Alice", 1).await;

        let msg = host_rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        assert_eq!(value["type"], "player_joined");
        assert_eq!(value["data"]["player_count"], 1);
    }
}
