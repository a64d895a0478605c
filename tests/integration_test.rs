// Integration tests for the quiz server
// These tests verify end-to-end functionality including HTTP endpoints and WebSocket connections

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const BASE: &str = "http://127.0.0.1:8080/api/v1";
const WS_BASE: &str = "ws://127.0.0.1:8080/api/v1";

async fn seed_quiz(client: &reqwest::Client) -> String {
    let resp = client
        .post(format!("{}/dev/sample-quiz", BASE))
        .send()
        .await
        .expect("Server not running. Start it with 'cargo run' before integration tests.");
    assert_eq!(resp.status(), 201);
    let quiz: serde_json::Value = resp.json().await.unwrap();
    quiz["id"].as_str().unwrap().to_string()
}

async fn seed_room(client: &reqwest::Client, quiz_id: &str, host_id: &str) -> String {
    let resp = client
        .post(format!("{}/rooms", BASE))
        .json(&json!({ "quiz_id": quiz_id, "host_name": "Test Host", "host_id": host_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let room: serde_json::Value = resp.json().await.unwrap();
    room["room_code"].as_str().unwrap().to_string()
}

async fn join(client: &reqwest::Client, room_code: &str, nickname: &str) -> String {
    let resp = client
        .post(format!("{}/rooms/{}/join", BASE, room_code))
        .json(&json!({ "nickname": nickname }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["player"]["player_id"].as_str().unwrap().to_string()
}

/// Wait for a specific event type on a WebSocket stream, skipping others.
async fn expect_event<S>(read: &mut S, event_type: &str) -> serde_json::Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = timeout(Duration::from_secs(5), read.next())
            .await
            .unwrap_or_else(|_| panic!("Timeout waiting for {}", event_type))
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            let event: serde_json::Value = serde_json::from_str(&text).unwrap();
            if event["type"] == event_type {
                return event["data"].clone();
            }
        }
    }
}

/// Test HTTP health check endpoint
#[tokio::test]
#[ignore] // Requires running server
async fn test_health_endpoint() {
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{}/health", BASE))
        .send()
        .await
        .expect("Server not running");
    assert_eq!(resp.status(), 200, "Health endpoint should return 200 OK");

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Quiz Server");
}

/// Test quiz creation and room setup over HTTP
#[tokio::test]
#[ignore] // Requires running server
async fn test_room_creation_flow() {
    let client = reqwest::Client::new();
    let quiz_id = seed_quiz(&client).await;
    let room_code = seed_room(&client, &quiz_id, "it-host-1").await;

    assert_eq!(room_code.len(), 6, "Room code should be 6 characters");
    assert!(
        room_code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
        "Room code should be uppercase alphanumeric"
    );

    let resp = client
        .get(format!("{}/rooms/{}", BASE, room_code))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let room: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(room["status"], "waiting");
    assert_eq!(room["player_count"], 0);
}

/// Test that a player join is announced over the host WebSocket
#[tokio::test]
#[ignore] // Requires running server
async fn test_join_broadcast() {
    let client = reqwest::Client::new();
    let quiz_id = seed_quiz(&client).await;
    let room_code = seed_room(&client, &quiz_id, "it-host-2").await;

    let (host_ws, _) = connect_async(format!("{}/ws/host/{}/it-host-2", WS_BASE, room_code))
        .await
        .expect("Host WebSocket connection failed");
    let (_, mut host_read) = host_ws.split();

    join(&client, &room_code, "Watcher").await;

    let data = expect_event(&mut host_read, "player_joined").await;
    assert_eq!(data["nickname"], "Watcher");
    assert_eq!(data["player_count"], 1);
}

/// Test that the host endpoint rejects a mismatched host id
#[tokio::test]
#[ignore] // Requires running server
async fn test_host_endpoint_rejects_impostor() {
    let client = reqwest::Client::new();
    let quiz_id = seed_quiz(&client).await;
    let room_code = seed_room(&client, &quiz_id, "it-host-3").await;

    let (ws, _) = connect_async(format!("{}/ws/host/{}/impostor", WS_BASE, room_code))
        .await
        .expect("Connection should upgrade before rejection");
    let (_, mut read) = ws.split();

    let data = expect_event(&mut read, "error").await;
    assert_eq!(data["error_code"], "UNAUTHORIZED");
}

/// Test that unknown players cannot attach a WebSocket
#[tokio::test]
#[ignore] // Requires running server
async fn test_player_endpoint_rejects_unknown_player() {
    let client = reqwest::Client::new();
    let quiz_id = seed_quiz(&client).await;
    let room_code = seed_room(&client, &quiz_id, "it-host-4").await;

    let (ws, _) = connect_async(format!("{}/ws/{}/never-joined", WS_BASE, room_code))
        .await
        .expect("Connection should upgrade before rejection");
    let (_, mut read) = ws.split();

    let data = expect_event(&mut read, "error").await;
    assert_eq!(data["error_code"], "PLAYER_NOT_FOUND");
}

/// Full game driven over WebSockets: start, answer, advance, complete
#[tokio::test]
#[ignore] // Requires running server
async fn test_full_game_flow() {
    let client = reqwest::Client::new();
    let quiz_id = seed_quiz(&client).await;
    let room_code = seed_room(&client, &quiz_id, "it-host-5").await;
    let player_id = join(&client, &room_code, "Runner").await;

    let (host_ws, _) = connect_async(format!("{}/ws/host/{}/it-host-5", WS_BASE, room_code))
        .await
        .unwrap();
    let (player_ws, _) = connect_async(format!("{}/ws/{}/{}", WS_BASE, room_code, player_id))
        .await
        .unwrap();
    let (mut host_write, mut host_read) = host_ws.split();
    let (mut player_write, mut player_read) = player_ws.split();

    host_write
        .send(Message::Text(json!({ "type": "start_game" }).to_string()))
        .await
        .unwrap();

    let mut total_questions = 0;
    loop {
        let question = expect_event(&mut player_read, "question_started").await;
        total_questions = question["total_questions"].as_u64().unwrap();

        let answer = json!({
            "type": "answer_submitted",
            "data": {
                "question_id": question["question"]["id"],
                "choice_id": question["question"]["choices"][0]["id"],
                "response_time": 1.5,
            }
        });
        player_write
            .send(Message::Text(answer.to_string()))
            .await
            .unwrap();

        let result = expect_event(&mut player_read, "answer_result").await;
        assert!(result["points_earned"].is_number());

        let submitted = expect_event(&mut host_read, "answer_submitted").await;
        assert_eq!(submitted["nickname"], "Runner");

        host_write
            .send(Message::Text(json!({ "type": "next_question" }).to_string()))
            .await
            .unwrap();

        if question["question_number"].as_u64().unwrap() == total_questions {
            break;
        }
    }

    let ended = expect_event(&mut player_read, "game_ended").await;
    assert_eq!(ended["game_stats"]["total_questions"].as_u64().unwrap(), total_questions);
    let players = ended["final_leaderboard"]["players"].as_array().unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0]["rank"], 1);
}

/// Test duplicate answers are rejected on the submitter's connection only
#[tokio::test]
#[ignore] // Requires running server
async fn test_duplicate_answer_rejection() {
    let client = reqwest::Client::new();
    let quiz_id = seed_quiz(&client).await;
    let room_code = seed_room(&client, &quiz_id, "it-host-6").await;
    let player_id = join(&client, &room_code, "Repeater").await;

    let resp = client
        .post(format!("{}/rooms/{}/start", BASE, room_code))
        .json(&json!({ "host_id": "it-host-6" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (ws, _) = connect_async(format!("{}/ws/{}/{}", WS_BASE, room_code, player_id))
        .await
        .unwrap();
    let (mut write, mut read) = ws.split();

    // Connecting mid-game resyncs onto the current question
    let resync = expect_event(&mut read, "question_started").await;
    assert!(resync["remaining_time"].is_number());

    let answer = json!({
        "type": "answer_submitted",
        "data": {
            "question_id": resync["question"]["id"],
            "choice_id": resync["question"]["choices"][0]["id"],
        }
    });
    write.send(Message::Text(answer.to_string())).await.unwrap();
    write.send(Message::Text(answer.to_string())).await.unwrap();

    expect_event(&mut read, "answer_result").await;
    let error = expect_event(&mut read, "error").await;
    assert_eq!(error["error_code"], "DUPLICATE_ANSWER");
}

/// Test room cancellation notifies connected players and removes the room
#[tokio::test]
#[ignore] // Requires running server
async fn test_cancel_room() {
    let client = reqwest::Client::new();
    let quiz_id = seed_quiz(&client).await;
    let room_code = seed_room(&client, &quiz_id, "it-host-7").await;
    let player_id = join(&client, &room_code, "Leaver").await;

    let (ws, _) = connect_async(format!("{}/ws/{}/{}", WS_BASE, room_code, player_id))
        .await
        .unwrap();
    let (_, mut read) = ws.split();
    sleep(Duration::from_millis(100)).await;

    let resp = client
        .delete(format!("{}/rooms/{}", BASE, room_code))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let data = expect_event(&mut read, "room_cancelled").await;
    assert_eq!(data["room_code"].as_str().unwrap(), room_code);

    let resp = client
        .get(format!("{}/rooms/{}", BASE, room_code))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
