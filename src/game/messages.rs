use serde::{Deserialize, Serialize};

use crate::game::room::{Leaderboard, QuestionStats};
use crate::store::{Question, QuestionType};

/// Inbound WebSocket messages. `start_game`/`next_question`/`end_game`
/// are host commands; `answer_submitted` comes from players. Anything
/// else fails to parse and is answered with an `error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    StartGame,
    NextQuestion,
    EndGame,
    AnswerSubmitted {
        question_id: String,
        choice_id: String,
        #[serde(default)]
        response_time: Option<f64>,
    },
}

/// A question as participants see it: no correctness flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPublic {
    pub id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub time_limit: u32,
    pub points: u32,
    pub order_index: u32,
    pub choices: Vec<ChoicePublic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoicePublic {
    pub id: String,
    pub choice_text: String,
    pub order_index: u32,
}

impl From<&Question> for QuestionPublic {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            question_text: question.question_text.clone(),
            question_type: question.question_type,
            time_limit: question.time_limit,
            points: question.points,
            order_index: question.order_index,
            choices: question
                .choices
                .iter()
                .map(|c| ChoicePublic {
                    id: c.id.clone(),
                    choice_text: c.choice_text.clone(),
                    order_index: c.order_index,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStats {
    pub total_questions: usize,
    pub total_players: usize,
    pub quiz_title: String,
    pub duration_ms: Option<u64>,
}

/// Outbound WebSocket events, `{type, data}` on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    QuestionStarted {
        question: QuestionPublic,
        question_number: usize,
        total_questions: usize,
        /// Only set on mid-question resync, so a reconnecting client can
        /// pick up the countdown where the room actually is.
        #[serde(skip_serializing_if = "Option::is_none")]
        remaining_time: Option<u32>,
    },
    QuestionEnded {
        question_id: String,
        results: QuestionStats,
        correct_choice_id: Option<String>,
    },
    GameEnded {
        final_leaderboard: Leaderboard,
        game_stats: GameStats,
    },
    LeaderboardUpdate {
        leaderboard: Leaderboard,
    },
    PlayerJoined {
        player_id: String,
        nickname: String,
        player_count: usize,
        timestamp: u64,
    },
    PlayerLeft {
        player_id: String,
        nickname: String,
        player_count: usize,
        timestamp: u64,
    },
    /// Sent only to the submitter.
    AnswerResult {
        is_correct: bool,
        points_earned: u32,
        correct_choice_id: Option<String>,
    },
    /// Sent only to the host.
    AnswerSubmitted {
        player_id: String,
        nickname: String,
        question_id: String,
        is_correct: bool,
        points_earned: u32,
    },
    RoomCancelled {
        room_code: String,
    },
    Error {
        message: String,
        error_code: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Choice, Question};

    fn question() -> Question {
        Question {
            id: "q1".into(),
            question_text: "What is 2 + 2?".into(),
            question_type: QuestionType::MultipleChoice,
            time_limit: 30,
            points: 100,
            order_index: 0,
            choices: vec![
                Choice {
                    id: "c1".into(),
                    choice_text: "3".into(),
                    is_correct: false,
                    order_index: 0,
                },
                Choice {
                    id: "c2".into(),
                    choice_text: "4".into(),
                    is_correct: true,
                    order_index: 1,
                },
            ],
        }
    }

    #[test]
    fn test_parse_host_command_without_data() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "start_game"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::StartGame));

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "next_question"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::NextQuestion));
    }

    #[test]
    fn test_parse_answer_submission() {
        let raw = r#"{
            "type": "answer_submitted",
            "data": {"question_id": "q1", "choice_id": "c2", "response_time": 4.5}
        }"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::AnswerSubmitted {
                question_id,
                choice_id,
                response_time,
            } => {
                assert_eq!(question_id, "q1");
                assert_eq!(choice_id, "c2");
                assert_eq!(response_time, Some(4.5));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_answer_without_latency() {
        let raw = r#"{
            "type": "answer_submitted",
            "data": {"question_id": "q1", "choice_id": "c2"}
        }"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::AnswerSubmitted {
                response_time: None,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type": "restart_game"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_public_question_strips_correctness() {
        let public = QuestionPublic::from(&question());
        let json = serde_json::to_value(&public).unwrap();

        assert_eq!(json["id"], "q1");
        assert_eq!(json["choices"].as_array().unwrap().len(), 2);
        for choice in json["choices"].as_array().unwrap() {
            assert!(choice.get("is_correct").is_none());
        }
    }

    #[test]
    fn test_server_event_wire_shape() {
        let event = ServerEvent::QuestionStarted {
            question: QuestionPublic::from(&question()),
            question_number: 1,
            total_questions: 2,
            remaining_time: None,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "question_started");
        assert_eq!(json["data"]["question_number"], 1);
        assert!(json["data"].get("remaining_time").is_none());
    }

    #[test]
    fn test_error_event_carries_code() {
        let event = ServerEvent::Error {
            message: "Room ABC123 not found".into(),
            error_code: "ROOM_NOT_FOUND".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"]["error_code"], "ROOM_NOT_FOUND");
    }
}
