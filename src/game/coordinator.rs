use std::sync::Arc;

use serde::Serialize;

use crate::config::GameConfig;
use crate::error::{QuizError, Result};
use crate::game::dispatcher::EventDispatcher;
use crate::game::messages::{ClientMessage, QuestionPublic, ServerEvent};
use crate::game::registry::{ConnectionRegistry, ConnectionStats, EventSender, RoomConnectionInfo};
use crate::game::room::{
    AdvanceOutcome, GameRoom, Leaderboard, Player, RoomInfo, RoomManager,
};
use crate::store::{generate_id, Quiz, QuizCreate, QuizStore, QuizSummary};

#[derive(Debug, Clone, Serialize)]
pub struct RoomOverview {
    #[serde(flatten)]
    pub info: RoomInfo,
    pub connections: RoomConnectionInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStats {
    pub total_rooms: usize,
    pub connections: ConnectionStats,
}

/// Outcome of an HTTP join: the admitted player plus where the room
/// currently stands, so late joiners know a game is already running.
#[derive(Debug, Clone, Serialize)]
pub struct JoinOutcome {
    pub player: Player,
    pub room: RoomInfo,
}

/// Ties the quiz store, room manager, connection registry and event
/// dispatcher together. Every game command locks its room's state for
/// the duration of mutation plus event enqueue, so observers see events
/// in the order the transitions actually happened.
pub struct GameCoordinator {
    store: Arc<QuizStore>,
    rooms: Arc<RoomManager>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: EventDispatcher,
    default_max_players: usize,
}

impl GameCoordinator {
    pub fn new(config: &GameConfig) -> Arc<Self> {
        let registry = ConnectionRegistry::new();
        Arc::new(Self {
            store: QuizStore::new(),
            rooms: RoomManager::new(config.room_code_length),
            registry: registry.clone(),
            dispatcher: EventDispatcher::new(registry),
            default_max_players: config.default_max_players,
        })
    }

    // ---- Quiz management ----

    pub async fn create_quiz(&self, data: QuizCreate) -> Result<Arc<Quiz>> {
        self.store.create_quiz(data).await
    }

    pub async fn get_quiz(&self, quiz_id: &str) -> Result<Arc<Quiz>> {
        self.store.get_quiz(quiz_id).await
    }

    pub async fn list_quizzes(&self, limit: usize) -> Vec<QuizSummary> {
        self.store.list_active_quizzes(limit).await
    }

    // ---- Room lifecycle ----

    pub async fn create_room(
        &self,
        quiz_id: &str,
        host_id: Option<String>,
        host_name: &str,
        max_players: Option<usize>,
    ) -> Result<(Arc<GameRoom>, RoomInfo)> {
        let quiz = self.store.get_quiz(quiz_id).await?;
        let host_id = host_id.unwrap_or_else(generate_id);
        let max_players = max_players.unwrap_or(self.default_max_players);
        let room = self
            .rooms
            .create_room(quiz, host_id, host_name.to_string(), max_players)
            .await?;
        let info = room.info().await;
        Ok((room, info))
    }

    pub async fn room_info(&self, room_code: &str) -> Result<RoomInfo> {
        let room = self.rooms.get_room(room_code).await?;
        Ok(room.info().await)
    }

    pub async fn list_rooms(&self) -> Vec<RoomOverview> {
        let mut overviews = Vec::new();
        for code in self.rooms.room_codes().await {
            if let Ok(room) = self.rooms.get_room(&code).await {
                overviews.push(RoomOverview {
                    info: room.info().await,
                    connections: self.registry.room_snapshot(&code).await,
                });
            }
        }
        overviews
    }

    pub async fn room_players(&self, room_code: &str) -> Result<Vec<Player>> {
        let room = self.rooms.get_room(room_code).await?;
        let state = room.state().await;
        let mut players: Vec<Player> = state.players().cloned().collect();
        players.sort_by_key(|p| p.join_order);
        Ok(players)
    }

    pub async fn leaderboard(&self, room_code: &str) -> Result<Leaderboard> {
        let room = self.rooms.get_room(room_code).await?;
        let state = room.state().await;
        Ok(state.leaderboard())
    }

    /// Admit a player over HTTP. The join and the `player_joined`
    /// broadcast happen under the room lock so concurrent joins announce
    /// in admission order.
    pub async fn join_room(
        &self,
        room_code: &str,
        player_id: Option<String>,
        nickname: &str,
    ) -> Result<JoinOutcome> {
        let room = self.rooms.get_room(room_code).await?;
        let player_id = player_id.unwrap_or_else(generate_id);

        let mut state = room.state().await;
        let player = state.join(&room.code, room.max_players, &player_id, nickname)?;
        let player_count = state.connected_count();
        self.dispatcher
            .player_joined(&room.code, &player.player_id, &player.nickname, player_count)
            .await;
        drop(state);

        tracing::info!(
            room_code = %room.code,
            player_id = %player.player_id,
            nickname = %player.nickname,
            "Player joined room"
        );
        Ok(JoinOutcome {
            player,
            room: room.info().await,
        })
    }

    /// Cancel a room and tear it down. Connected clients are told first,
    /// then the room and its connection entries are dropped together.
    pub async fn cancel_room(&self, room_code: &str) -> Result<RoomInfo> {
        let room = self.rooms.get_room(room_code).await?;

        {
            let mut state = room.state().await;
            if !state.status.is_terminal() {
                state.cancel()?;
            }
            self.dispatcher.room_cancelled(&room.code).await;
        }

        self.registry.clear_room(&room.code).await;
        self.rooms.remove_room(&room.code).await;
        tracing::info!(room_code = %room_code, "Room cancelled and removed");
        Ok(room.info().await)
    }

    pub async fn stats(&self) -> ServerStats {
        ServerStats {
            total_rooms: self.rooms.room_count().await,
            connections: self.registry.stats().await,
        }
    }

    // ---- Game commands ----

    fn authorize_host(&self, room: &GameRoom, requester_id: &str, action: &str) -> Result<()> {
        if room.host_id != requester_id {
            return Err(QuizError::unauthorized(action, &room.code));
        }
        Ok(())
    }

    pub async fn start_game(&self, room_code: &str, requester_id: &str) -> Result<RoomInfo> {
        let room = self.rooms.get_room(room_code).await?;
        self.authorize_host(&room, requester_id, "start game")?;

        let mut state = room.state().await;
        let first = state.start(&room.quiz)?;
        self.dispatcher.game_started(&room, first).await;
        drop(state);

        Ok(room.info().await)
    }

    /// Advance the room. Ending questions always publishes the closed
    /// question's results first; running off the end of the quiz completes
    /// the game and publishes the final leaderboard.
    pub async fn next_question(&self, room_code: &str, requester_id: &str) -> Result<RoomInfo> {
        let room = self.rooms.get_room(room_code).await?;
        self.authorize_host(&room, requester_id, "advance question")?;

        let mut state = room.state().await;
        let prev_index = state.current_question;
        let outcome = state.advance(&room.quiz)?;

        let prev_question = &room.quiz.questions[prev_index];
        let prev_stats = state.question_stats(&room.quiz, &prev_question.id)?;
        let prev_correct = prev_question.correct_choice_id().map(String::from);

        match outcome {
            AdvanceOutcome::NextQuestion(index) => {
                self.dispatcher
                    .question_advanced(&room, prev_stats, prev_correct, index)
                    .await;
            }
            AdvanceOutcome::GameCompleted => {
                self.dispatcher
                    .question_ended(&room, prev_stats, prev_correct)
                    .await;
                let duration = duration_ms(state.started_at, state.ended_at);
                let leaderboard = state.leaderboard();
                self.dispatcher.game_ended(&room, leaderboard, duration).await;
            }
        }
        drop(state);

        Ok(room.info().await)
    }

    pub async fn end_game(&self, room_code: &str, requester_id: &str) -> Result<RoomInfo> {
        let room = self.rooms.get_room(room_code).await?;
        self.authorize_host(&room, requester_id, "end game")?;

        let mut state = room.state().await;
        state.end()?;
        let duration = duration_ms(state.started_at, state.ended_at);
        let leaderboard = state.leaderboard();
        self.dispatcher.game_ended(&room, leaderboard, duration).await;
        drop(state);

        Ok(room.info().await)
    }

    pub async fn submit_answer(
        &self,
        room_code: &str,
        player_id: &str,
        question_id: &str,
        choice_id: &str,
        response_time: Option<f64>,
    ) -> Result<()> {
        let room = self.rooms.get_room(room_code).await?;

        let mut state = room.state().await;
        let result = state.submit(&room.quiz, player_id, question_id, choice_id, response_time)?;
        let nickname = state
            .player(player_id)
            .map(|p| p.nickname.clone())
            .ok_or_else(|| QuizError::internal("player record missing after answer admission"))?;
        let leaderboard = state.leaderboard();
        self.dispatcher
            .answer_submitted(
                &room.code,
                player_id,
                &nickname,
                question_id,
                &result,
                leaderboard,
            )
            .await;
        drop(state);

        tracing::debug!(
            room_code = %room_code,
            player_id = %player_id,
            question_id = %question_id,
            points = result.points_earned,
            "Answer recorded"
        );
        Ok(())
    }

    // ---- WebSocket session management ----

    /// Attach a host connection. The host id must match the one recorded
    /// at room creation. Mid-game hosts are resynced onto the current
    /// question immediately.
    pub async fn connect_host(
        &self,
        room_code: &str,
        host_id: &str,
        sender: EventSender,
    ) -> Result<Arc<GameRoom>> {
        let room = self.rooms.get_room(room_code).await?;
        self.authorize_host(&room, host_id, "connect as host")?;

        self.registry.register_host(&room.code, sender).await;
        self.resync(&room, None).await;

        tracing::info!(room_code = %room_code, host_id = %host_id, "Host connected");
        Ok(room)
    }

    /// Attach a player connection. Only players who already joined over
    /// HTTP are accepted; unknown ids are rejected before the socket is
    /// registered. Reconnecting mid-question resends the current question
    /// with the remaining time so client countdowns line up.
    pub async fn connect_player(
        &self,
        room_code: &str,
        player_id: &str,
        sender: EventSender,
    ) -> Result<Arc<GameRoom>> {
        let room = self.rooms.get_room(room_code).await?;

        let nickname = {
            let mut state = room.state().await;
            state
                .set_connected(player_id, true)
                .ok_or_else(|| QuizError::PlayerNotFound(player_id.to_string()))?
        };

        self.registry
            .register_player(&room.code, player_id, &nickname, sender)
            .await;
        self.resync(&room, Some(player_id)).await;

        tracing::info!(
            room_code = %room_code,
            player_id = %player_id,
            nickname = %nickname,
            "Player connected"
        );
        Ok(room)
    }

    /// Resend the current question to one connection (or the host when
    /// `player_id` is None) if a game is in flight.
    async fn resync(&self, room: &GameRoom, player_id: Option<&str>) {
        let state = room.state().await;
        if state.status != crate::game::room::GameStatus::Active {
            return;
        }
        let index = state.current_question;
        let question = &room.quiz.questions[index];
        let event = ServerEvent::QuestionStarted {
            question: QuestionPublic::from(question),
            question_number: index + 1,
            total_questions: room.quiz.questions.len(),
            remaining_time: state.remaining_time(&room.quiz),
        };
        match player_id {
            Some(pid) => self.registry.send_to_player(&room.code, pid, &event).await,
            None => self.registry.send_to_host(&room.code, &event).await,
        }
    }

    /// Player socket closed. Connection state flips but the player, their
    /// answers and their score all stay; they can reconnect and continue.
    pub async fn disconnect_player(&self, room_code: &str, player_id: &str) {
        self.registry.unregister_player(room_code, player_id).await;

        let Ok(room) = self.rooms.get_room(room_code).await else {
            return;
        };
        let mut state = room.state().await;
        if let Some(nickname) = state.set_connected(player_id, false) {
            let player_count = state.connected_count();
            self.dispatcher
                .player_left(&room.code, player_id, &nickname, player_count)
                .await;
        }
        drop(state);

        tracing::info!(room_code = %room_code, player_id = %player_id, "Player disconnected");
    }

    /// Host socket closed. Players are told but the game keeps its state;
    /// the host can reconnect and pick the session back up.
    pub async fn disconnect_host(&self, room_code: &str) {
        self.registry.unregister_host(room_code).await;
        self.dispatcher.host_disconnected(room_code).await;
        tracing::info!(room_code = %room_code, "Host disconnected");
    }

    /// Host WebSocket command. Failures are answered on the host's own
    /// connection, never broadcast.
    pub async fn handle_host_message(&self, room: &GameRoom, message: ClientMessage) {
        let result = match message {
            ClientMessage::StartGame => self.start_game(&room.code, &room.host_id).await.map(|_| ()),
            ClientMessage::NextQuestion => {
                self.next_question(&room.code, &room.host_id).await.map(|_| ())
            }
            ClientMessage::EndGame => self.end_game(&room.code, &room.host_id).await.map(|_| ()),
            ClientMessage::AnswerSubmitted { .. } => {
                Err(QuizError::unauthorized("submit answer", &room.code))
            }
        };
        if let Err(err) = result {
            tracing::warn!(room_code = %room.code, error = %err, "Host command rejected");
            self.dispatcher.error_to_host(&room.code, &err).await;
        }
    }

    /// Player WebSocket command. Only answer submission is accepted;
    /// game-control messages from players are unauthorized.
    pub async fn handle_player_message(
        &self,
        room: &GameRoom,
        player_id: &str,
        message: ClientMessage,
    ) {
        let result = match message {
            ClientMessage::AnswerSubmitted {
                question_id,
                choice_id,
                response_time,
            } => {
                self.submit_answer(&room.code, player_id, &question_id, &choice_id, response_time)
                    .await
            }
            ClientMessage::StartGame | ClientMessage::NextQuestion | ClientMessage::EndGame => {
                Err(QuizError::unauthorized("control game", &room.code))
            }
        };
        if let Err(err) = result {
            tracing::warn!(
                room_code = %room.code,
                player_id = %player_id,
                error = %err,
                "Player command rejected"
            );
            self.dispatcher.error_to_player(&room.code, player_id, &err).await;
        }
    }
}

fn duration_ms(started_at: Option<u64>, ended_at: Option<u64>) -> Option<u64> {
    match (started_at, ended_at) {
        (Some(start), Some(end)) => Some(end.saturating_sub(start)),
        _ => None,
    }
}
