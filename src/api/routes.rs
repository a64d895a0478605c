use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::error::{QuizError, Result};
use crate::game::GameCoordinator;
use crate::store::{ChoiceCreate, QuestionCreate, QuestionType, QuizCreate};

use super::websocket;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub quiz_id: String,
    pub host_name: String,
    pub host_id: Option<String>,
    pub max_players: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    #[serde(default)]
    pub nickname: String,
    pub player_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HostActionRequest {
    pub host_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// All management routes plus the two WebSocket endpoints, rooted at
/// `/api/v1`.
pub fn routes(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    health_route()
        .or(stats_route(coordinator.clone()))
        .or(create_quiz_route(coordinator.clone()))
        .or(get_quiz_route(coordinator.clone()))
        .or(list_quizzes_route(coordinator.clone()))
        .or(sample_quiz_route(coordinator.clone()))
        .or(create_room_route(coordinator.clone()))
        .or(list_rooms_route(coordinator.clone()))
        .or(get_room_route(coordinator.clone()))
        .or(join_room_route(coordinator.clone()))
        .or(room_players_route(coordinator.clone()))
        .or(leaderboard_route(coordinator.clone()))
        .or(start_game_route(coordinator.clone()))
        .or(next_question_route(coordinator.clone()))
        .or(end_game_route(coordinator.clone()))
        .or(cancel_room_route(coordinator.clone()))
        .or(host_websocket_route(coordinator.clone()))
        .or(player_websocket_route(coordinator))
}

pub fn health_route() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Quiz Server",
                "version": env!("CARGO_PKG_VERSION")
            }))
        })
}

fn stats_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "stats")
        .and(warp::get())
        .and(with_coordinator(coordinator))
        .and_then(|coordinator: Arc<GameCoordinator>| async move {
            let stats = coordinator.stats().await;
            ok_reply(warp::reply::json(&stats))
        })
}

fn create_quiz_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "quizzes")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_coordinator(coordinator))
        .and_then(|data: QuizCreate, coordinator: Arc<GameCoordinator>| async move {
            let result = coordinator.create_quiz(data).await;
            reply_result(result.map(|quiz| quiz.as_ref().clone()), StatusCode::CREATED)
        })
}

fn get_quiz_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "quizzes" / String)
        .and(warp::get())
        .and(with_coordinator(coordinator))
        .and_then(|quiz_id: String, coordinator: Arc<GameCoordinator>| async move {
            let result = coordinator.get_quiz(&quiz_id).await;
            reply_result(result.map(|quiz| quiz.as_ref().clone()), StatusCode::OK)
        })
}

fn list_quizzes_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "quizzes")
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_coordinator(coordinator))
        .and_then(|query: ListQuery, coordinator: Arc<GameCoordinator>| async move {
            let quizzes = coordinator.list_quizzes(query.limit.unwrap_or(100)).await;
            ok_reply(warp::reply::json(&quizzes))
        })
}

/// Development helper: seed the store with a small ready-to-play quiz.
fn sample_quiz_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "dev" / "sample-quiz")
        .and(warp::post())
        .and(with_coordinator(coordinator))
        .and_then(|coordinator: Arc<GameCoordinator>| async move {
            let result = coordinator.create_quiz(sample_quiz()).await;
            reply_result(result.map(|quiz| quiz.as_ref().clone()), StatusCode::CREATED)
        })
}

fn create_room_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_coordinator(coordinator))
        .and_then(|body: CreateRoomRequest, coordinator: Arc<GameCoordinator>| async move {
            let result = coordinator
                .create_room(&body.quiz_id, body.host_id, &body.host_name, body.max_players)
                .await;
            reply_result(result.map(|(_, info)| info), StatusCode::CREATED)
        })
}

fn list_rooms_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms")
        .and(warp::get())
        .and(with_coordinator(coordinator))
        .and_then(|coordinator: Arc<GameCoordinator>| async move {
            let rooms = coordinator.list_rooms().await;
            ok_reply(warp::reply::json(&rooms))
        })
}

fn get_room_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms" / String)
        .and(warp::get())
        .and(with_coordinator(coordinator))
        .and_then(|room_code: String, coordinator: Arc<GameCoordinator>| async move {
            reply_result(coordinator.room_info(&room_code).await, StatusCode::OK)
        })
}

fn join_room_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms" / String / "join")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_coordinator(coordinator))
        .and_then(
            |room_code: String, body: JoinRoomRequest, coordinator: Arc<GameCoordinator>| async move {
                let result = coordinator
                    .join_room(&room_code, body.player_id, &body.nickname)
                    .await;
                reply_result(result, StatusCode::CREATED)
            },
        )
}

fn room_players_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms" / String / "players")
        .and(warp::get())
        .and(with_coordinator(coordinator))
        .and_then(|room_code: String, coordinator: Arc<GameCoordinator>| async move {
            reply_result(coordinator.room_players(&room_code).await, StatusCode::OK)
        })
}

fn leaderboard_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms" / String / "leaderboard")
        .and(warp::get())
        .and(with_coordinator(coordinator))
        .and_then(|room_code: String, coordinator: Arc<GameCoordinator>| async move {
            reply_result(coordinator.leaderboard(&room_code).await, StatusCode::OK)
        })
}

fn start_game_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms" / String / "start")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_coordinator(coordinator))
        .and_then(
            |room_code: String, body: HostActionRequest, coordinator: Arc<GameCoordinator>| async move {
                reply_result(
                    coordinator.start_game(&room_code, &body.host_id).await,
                    StatusCode::OK,
                )
            },
        )
}

fn next_question_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms" / String / "next-question")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_coordinator(coordinator))
        .and_then(
            |room_code: String, body: HostActionRequest, coordinator: Arc<GameCoordinator>| async move {
                reply_result(
                    coordinator.next_question(&room_code, &body.host_id).await,
                    StatusCode::OK,
                )
            },
        )
}

fn end_game_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms" / String / "end")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_coordinator(coordinator))
        .and_then(
            |room_code: String, body: HostActionRequest, coordinator: Arc<GameCoordinator>| async move {
                reply_result(
                    coordinator.end_game(&room_code, &body.host_id).await,
                    StatusCode::OK,
                )
            },
        )
}

fn cancel_room_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "rooms" / String)
        .and(warp::delete())
        .and(with_coordinator(coordinator))
        .and_then(|room_code: String, coordinator: Arc<GameCoordinator>| async move {
            reply_result(coordinator.cancel_room(&room_code).await, StatusCode::OK)
        })
}

fn host_websocket_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "ws" / "host" / String / String)
        .and(warp::ws())
        .and(with_coordinator(coordinator))
        .map(
            |room_code: String, host_id: String, ws: warp::ws::Ws, coordinator: Arc<GameCoordinator>| {
                ws.on_upgrade(move |websocket| {
                    websocket::handle_host_connection(websocket, coordinator, room_code, host_id)
                })
            },
        )
}

fn player_websocket_route(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "v1" / "ws" / String / String)
        .and(warp::ws())
        .and(with_coordinator(coordinator))
        .map(
            |room_code: String, player_id: String, ws: warp::ws::Ws, coordinator: Arc<GameCoordinator>| {
                ws.on_upgrade(move |websocket| {
                    websocket::handle_player_connection(websocket, coordinator, room_code, player_id)
                })
            },
        )
}

fn with_coordinator(
    coordinator: Arc<GameCoordinator>,
) -> impl Filter<Extract = (Arc<GameCoordinator>,), Error = Infallible> + Clone {
    warp::any().map(move || coordinator.clone())
}

fn ok_reply<T: Reply>(reply: T) -> std::result::Result<Response, Infallible> {
    Ok(reply.into_response())
}

/// Translate an operation result into a reply, carrying the error's
/// stable code and HTTP status on failure.
fn reply_result<T: Serialize>(
    result: Result<T>,
    success_status: StatusCode,
) -> std::result::Result<Response, Infallible> {
    match result {
        Ok(value) => Ok(warp::reply::with_status(warp::reply::json(&value), success_status)
            .into_response()),
        Err(err) => Ok(error_reply(&err)),
    }
}

fn error_reply(err: &QuizError) -> Response {
    let status = StatusCode::from_u16(err.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "success": false,
            "message": err.to_string(),
            "error_code": err.code(),
        })),
        status,
    )
    .into_response()
}

/// Quiz seeded by the sample-quiz endpoint.
fn sample_quiz() -> QuizCreate {
    let question = |text: &str, time_limit, points, order_index, choices| QuestionCreate {
        question_text: text.to_string(),
        question_type: QuestionType::MultipleChoice,
        time_limit,
        points,
        order_index,
        choices,
    };
    let choice = |text: &str, is_correct, order_index| ChoiceCreate {
        choice_text: text.to_string(),
        is_correct,
        order_index,
    };

    QuizCreate {
        title: "General Knowledge Warm-up".to_string(),
        description: Some("A short quiz for trying the server out".to_string()),
        created_by: "dev".to_string(),
        questions: vec![
            question(
                "Which planet is known as the Red Planet?",
                20,
                100,
                0,
                vec![
                    choice("Venus", false, 0),
                    choice("Mars", true, 1),
                    choice("Jupiter", false, 2),
                ],
            ),
            question(
                "What is the largest ocean on Earth?",
                20,
                100,
                1,
                vec![
                    choice("Atlantic", false, 0),
                    choice("Pacific", true, 1),
                    choice("Indian", false, 2),
                ],
            ),
            question(
                "How many continents are there?",
                15,
                150,
                2,
                vec![
                    choice("Five", false, 0),
                    choice("Six", false, 1),
                    choice("Seven", true, 2),
                ],
            ),
        ],
    }
}
