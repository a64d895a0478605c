// Quiz Server CLI Validation Tool
// Validates quiz server functionality through automated scenarios and interactive sessions

use clap::{Parser, Subcommand};
use colored::*;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::io::{self, Write};
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "quiz-cli")]
#[command(about = "Quiz Server CLI Validation Tool", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:8080)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Show server statistics (rooms and connections)
    Stats,

    /// Create the built-in sample quiz
    SampleQuiz,

    /// Create a game room for a quiz
    CreateRoom {
        /// Quiz ID to play
        #[arg(short, long)]
        quiz_id: String,

        /// Host display name
        #[arg(long, default_value = "CLI Host")]
        host_name: String,

        /// Host ID (generated by the server if omitted)
        #[arg(long)]
        host_id: Option<String>,
    },

    /// Run a host session: connect and drive the game interactively
    Host {
        /// Room code
        #[arg(short, long)]
        room_code: String,

        /// Host ID recorded at room creation
        #[arg(long)]
        host_id: String,
    },

    /// Join a room as a player and tail the event stream
    Join {
        /// Room code
        #[arg(short, long)]
        room_code: String,

        /// Player nickname
        #[arg(short, long, default_value = "")]
        nickname: String,
    },

    /// Run automated validation scenarios
    Validate {
        /// Run all validation tests
        #[arg(short, long)]
        all: bool,

        /// Test specific scenario
        #[arg(long)]
        scenario: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => {
            check_health(&cli.server).await;
        }
        Commands::Stats => {
            check_stats(&cli.server).await;
        }
        Commands::SampleQuiz => {
            create_sample_quiz(&cli.server).await;
        }
        Commands::CreateRoom {
            quiz_id,
            host_name,
            host_id,
        } => {
            create_room(&cli.server, quiz_id, host_name, host_id.as_deref()).await;
        }
        Commands::Host { room_code, host_id } => {
            host_session(&cli.server, room_code, host_id).await;
        }
        Commands::Join {
            room_code,
            nickname,
        } => {
            player_session(&cli.server, room_code, nickname).await;
        }
        Commands::Validate { all, scenario } => {
            if *all {
                run_all_validations(&cli.server).await;
            } else if let Some(s) = scenario {
                run_scenario(&cli.server, s).await;
            } else {
                println!("{}", "Use --all or --scenario <name>".yellow());
                list_scenarios();
            }
        }
    }
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/api/v1/health", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            let status = resp.status();
            if status.is_success() {
                println!("{} Health check passed", "✓".green());

                if let Ok(body) = resp.json::<serde_json::Value>().await {
                    println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
                    println!("  Service: {}", body["service"].as_str().unwrap_or("unknown"));
                    println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
                }
            } else {
                println!("{} Health check failed: {}", "✗".red(), status);
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            println!("  Make sure the server is running on {}", server);
        }
    }
}

async fn check_stats(server: &str) {
    println!("{}", "Fetching server statistics...".cyan());

    let url = format!("http://{}/api/v1/stats", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                if let Ok(body) = resp.json::<serde_json::Value>().await {
                    println!("{} Stats endpoint accessible", "✓".green());
                    println!("  Rooms: {}", body["total_rooms"]);
                    println!("  Hosts connected: {}", body["connections"]["hosts_connected"]);
                    println!("  Players connected: {}", body["connections"]["total_players"]);
                }
            } else {
                println!("{} Stats fetch failed: {}", "✗".red(), resp.status());
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

async fn create_sample_quiz(server: &str) {
    println!("{}", "Creating sample quiz...".cyan());

    let url = format!("http://{}/api/v1/dev/sample-quiz", server);
    let client = reqwest::Client::new();

    match client.post(&url).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                if let Ok(body) = resp.json::<serde_json::Value>().await {
                    println!("{} Sample quiz created", "✓".green());
                    println!("  Quiz ID: {}", body["id"].as_str().unwrap_or("unknown").green().bold());
                    println!("  Title: {}", body["title"].as_str().unwrap_or("unknown"));
                    println!(
                        "  Questions: {}",
                        body["questions"].as_array().map(|q| q.len()).unwrap_or(0)
                    );
                }
            } else {
                println!("{} Quiz creation failed: {}", "✗".red(), resp.status());
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

async fn create_room(server: &str, quiz_id: &str, host_name: &str, host_id: Option<&str>) {
    println!("{}", "Creating room...".cyan());
    println!("  Quiz ID: {}", quiz_id);

    let url = format!("http://{}/api/v1/rooms", server);
    let client = reqwest::Client::new();
    let body = json!({
        "quiz_id": quiz_id,
        "host_name": host_name,
        "host_id": host_id,
    });

    match client.post(&url).json(&body).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                if let Ok(room) = resp.json::<serde_json::Value>().await {
                    let code = room["room_code"].as_str().unwrap_or("unknown");
                    println!("{} Room created successfully!", "✓".green());
                    println!("\n{}", "═".repeat(50).green());
                    println!("{} {}", "Room code:".bold(), code.green().bold());
                    println!("{} {}", "Host ID:".bold(), room["host_id"].as_str().unwrap_or("unknown"));
                    println!("{}", "═".repeat(50).green());
                    println!("\nPlayers join with: quiz-cli join --room-code {}", code);
                }
            } else {
                let status = resp.status();
                let message = resp
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|b| b["message"].as_str().map(String::from))
                    .unwrap_or_default();
                println!("{} Room creation failed ({}): {}", "✗".red(), status, message);
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

/// Interactive host session over the host WebSocket endpoint.
async fn host_session(server: &str, room_code: &str, host_id: &str) {
    let url = format!("ws://{}/api/v1/ws/host/{}/{}", server, room_code, host_id);
    println!("{}", "Connecting as host...".cyan());

    let (ws_stream, _) = match connect_async(&url).await {
        Ok(ok) => ok,
        Err(e) => {
            println!("{} Cannot connect: {}", "✗".red(), e);
            return;
        }
    };
    println!("{} Host connected to room {}", "✓".green(), room_code.green().bold());
    println!(
        "Commands: {} start, {} next question, {} end game, {} quit",
        "s".bold(),
        "n".bold(),
        "e".bold(),
        "q".bold()
    );

    let (mut write, mut read) = ws_stream.split();

    // Tail incoming events in the background
    let reader = tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => print_event(&text),
                Ok(Message::Close(_)) => {
                    println!("{} Server closed the connection", "✗".yellow());
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    println!("{} Connection error: {}", "✗".red(), e);
                    break;
                }
            }
        }
    });

    let stdin = io::stdin();
    loop {
        print!("{} ", ">".bold());
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.read_line(&mut line).is_err() {
            break;
        }
        let command = match line.trim() {
            "s" => json!({ "type": "start_game" }),
            "n" => json!({ "type": "next_question" }),
            "e" => json!({ "type": "end_game" }),
            "q" => break,
            "" => continue,
            other => {
                println!("{} Unknown command: {}", "✗".yellow(), other);
                continue;
            }
        };
        if write.send(Message::Text(command.to_string())).await.is_err() {
            println!("{} Failed to send command", "✗".red());
            break;
        }
    }

    reader.abort();
    println!("{}", "Host session closed".cyan());
}

/// Join over HTTP, then attach the player WebSocket and tail events.
async fn player_session(server: &str, room_code: &str, nickname: &str) {
    println!("{}", "Joining room...".cyan());

    let client = reqwest::Client::new();
    let join_url = format!("http://{}/api/v1/rooms/{}/join", server, room_code);
    let joined = match client
        .post(&join_url)
        .json(&json!({ "nickname": nickname }))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => match resp.json::<serde_json::Value>().await {
            Ok(body) => body,
            Err(e) => {
                println!("{} Bad join response: {}", "✗".red(), e);
                return;
            }
        },
        Ok(resp) => {
            let status = resp.status();
            let message = resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|b| b["message"].as_str().map(String::from))
                .unwrap_or_default();
            println!("{} Join failed ({}): {}", "✗".red(), status, message);
            return;
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            return;
        }
    };

    let player_id = joined["player"]["player_id"].as_str().unwrap_or_default().to_string();
    let assigned = joined["player"]["nickname"].as_str().unwrap_or_default();
    println!("{} Joined as {}", "✓".green(), assigned.green().bold());
    println!("  Player ID: {}", player_id);

    let url = format!("ws://{}/api/v1/ws/{}/{}", server, room_code, player_id);
    let (ws_stream, _) = match connect_async(&url).await {
        Ok(ok) => ok,
        Err(e) => {
            println!("{} WebSocket connection failed: {}", "✗".red(), e);
            return;
        }
    };
    println!("{} Listening for game events (Ctrl+C to leave)...", "✓".green());

    let (_write, mut read) = ws_stream.split();
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => print_event(&text),
            Ok(Message::Close(_)) => {
                println!("{} Server closed the connection", "✗".yellow());
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                println!("{} Connection error: {}", "✗".red(), e);
                break;
            }
        }
    }
}

fn print_event(text: &str) {
    let Ok(event) = serde_json::from_str::<serde_json::Value>(text) else {
        println!("{} {}", "◀".green(), text);
        return;
    };
    let data = &event["data"];
    match event["type"].as_str() {
        Some("question_started") => {
            println!(
                "\n{} Question {}/{}: {}",
                "▶".cyan(),
                data["question_number"],
                data["total_questions"],
                data["question"]["question_text"].as_str().unwrap_or("?").bold()
            );
            if let Some(choices) = data["question"]["choices"].as_array() {
                for choice in choices {
                    println!(
                        "    [{}] {}",
                        choice["id"].as_str().unwrap_or("?"),
                        choice["choice_text"].as_str().unwrap_or("?")
                    );
                }
            }
        }
        Some("question_ended") => {
            println!(
                "{} Question over: {}/{} correct",
                "■".cyan(),
                data["results"]["correct_answers"],
                data["results"]["total_answers"]
            );
        }
        Some("answer_result") => {
            if data["is_correct"].as_bool().unwrap_or(false) {
                println!("{} Correct! +{} points", "✓".green(), data["points_earned"]);
            } else {
                println!("{} Wrong answer", "✗".red());
            }
        }
        Some("leaderboard_update") => {
            println!("{}", "Leaderboard:".bold());
            if let Some(players) = data["leaderboard"]["players"].as_array() {
                for p in players.iter().take(5) {
                    println!(
                        "  {}. {} - {} pts",
                        p["rank"],
                        p["nickname"].as_str().unwrap_or("?"),
                        p["total_score"]
                    );
                }
            }
        }
        Some("game_ended") => {
            println!("\n{}", "═".repeat(50).green());
            println!("{}", "Game over!".bold().green());
            if let Some(players) = data["final_leaderboard"]["players"].as_array() {
                for p in players {
                    println!(
                        "  {}. {} - {} pts",
                        p["rank"],
                        p["nickname"].as_str().unwrap_or("?"),
                        p["total_score"]
                    );
                }
            }
            println!("{}", "═".repeat(50).green());
        }
        Some("player_joined") => {
            println!(
                "{} {} joined ({} players)",
                "+".green(),
                data["nickname"].as_str().unwrap_or("?"),
                data["player_count"]
            );
        }
        Some("player_left") => {
            println!(
                "{} {} left ({} players)",
                "-".yellow(),
                data["nickname"].as_str().unwrap_or("?"),
                data["player_count"]
            );
        }
        Some("error") => {
            println!(
                "{} {} ({})",
                "✗".red(),
                data["message"].as_str().unwrap_or("error"),
                data["error_code"].as_str().unwrap_or("")
            );
        }
        _ => println!("{} {}", "◀".green(), text),
    }
}

fn list_scenarios() {
    println!("\n{}", "Available Validation Scenarios:".bold());
    println!("  {} - Health endpoint reachable", "health".cyan());
    println!("  {} - Quiz creation and retrieval", "quiz-crud".cyan());
    println!("  {} - Room creation and join flow", "room-flow".cyan());
    println!("  {} - Full game: start, answer, advance, finish", "full-game".cyan());
    println!("  {} - Joining a nonexistent room (error handling)", "invalid-room".cyan());
    println!("  {} - Duplicate answer rejection", "duplicate-answer".cyan());
    println!("\nExample: quiz-cli validate --scenario full-game");
}

async fn run_scenario(server: &str, scenario: &str) {
    println!("\n{} {}", "Running scenario:".bold(), scenario.cyan());
    println!("{}", "─".repeat(60));

    let result = match scenario {
        "health" => validate_health(server).await,
        "quiz-crud" => validate_quiz_crud(server).await,
        "room-flow" => validate_room_flow(server).await,
        "full-game" => validate_full_game(server).await,
        "invalid-room" => validate_invalid_room(server).await,
        "duplicate-answer" => validate_duplicate_answer(server).await,
        _ => {
            println!("{} Unknown scenario: {}", "✗".red(), scenario);
            list_scenarios();
            return;
        }
    };

    if result {
        println!("\n{} Scenario passed", "✓".green().bold());
    } else {
        println!("\n{} Scenario failed", "✗".red().bold());
    }
}

async fn run_all_validations(server: &str) {
    println!("\n{}", "Running All Validation Tests".bold().green());
    println!("{}\n", "═".repeat(60).green());

    let scenarios = vec![
        "health",
        "quiz-crud",
        "room-flow",
        "full-game",
        "invalid-room",
        "duplicate-answer",
    ];

    let mut passed = 0;
    let mut failed = 0;

    for scenario in scenarios {
        println!("\n{} Testing: {}", "▶".cyan(), scenario.bold());
        println!("{}", "─".repeat(60));

        let result = match scenario {
            "health" => validate_health(server).await,
            "quiz-crud" => validate_quiz_crud(server).await,
            "room-flow" => validate_room_flow(server).await,
            "full-game" => validate_full_game(server).await,
            "invalid-room" => validate_invalid_room(server).await,
            "duplicate-answer" => validate_duplicate_answer(server).await,
            _ => false,
        };

        if result {
            passed += 1;
        } else {
            failed += 1;
        }

        sleep(Duration::from_millis(300)).await;
    }

    println!("\n{}", "═".repeat(60).green());
    println!("{}", "Validation Summary".bold());
    println!("{}", "═".repeat(60).green());
    println!("  {} {}", "Passed:".green(), passed);
    println!("  {} {}", "Failed:".red(), failed);
}

// ---- validation scenarios ----

async fn validate_health(server: &str) -> bool {
    let url = format!("http://{}/api/v1/health", server);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            println!("{} Server healthy", "✓".green());
            true
        }
        Ok(resp) => {
            println!("{} Unexpected status: {}", "✗".red(), resp.status());
            false
        }
        Err(e) => {
            println!("{} Cannot reach server: {}", "✗".red(), e);
            false
        }
    }
}

async fn seed_quiz(server: &str) -> Option<String> {
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/v1/dev/sample-quiz", server);
    let resp = client.post(&url).send().await.ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let quiz = resp.json::<serde_json::Value>().await.ok()?;
    quiz["id"].as_str().map(String::from)
}

async fn seed_room(server: &str, quiz_id: &str, host_id: &str) -> Option<String> {
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/v1/rooms", server);
    let resp = client
        .post(&url)
        .json(&json!({ "quiz_id": quiz_id, "host_name": "Validator", "host_id": host_id }))
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let room = resp.json::<serde_json::Value>().await.ok()?;
    room["room_code"].as_str().map(String::from)
}

async fn join_player(server: &str, room_code: &str, nickname: &str) -> Option<String> {
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/v1/rooms/{}/join", server, room_code);
    let resp = client
        .post(&url)
        .json(&json!({ "nickname": nickname }))
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let body = resp.json::<serde_json::Value>().await.ok()?;
    body["player"]["player_id"].as_str().map(String::from)
}

async fn validate_quiz_crud(server: &str) -> bool {
    let Some(quiz_id) = seed_quiz(server).await else {
        println!("{} Sample quiz creation failed", "✗".red());
        return false;
    };
    println!("{} Quiz created: {}", "✓".green(), quiz_id);

    let url = format!("http://{}/api/v1/quizzes/{}", server, quiz_id);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            println!("{} Quiz retrievable by id", "✓".green());
            true
        }
        _ => {
            println!("{} Quiz retrieval failed", "✗".red());
            false
        }
    }
}

async fn validate_room_flow(server: &str) -> bool {
    let Some(quiz_id) = seed_quiz(server).await else {
        println!("{} Quiz setup failed", "✗".red());
        return false;
    };
    let Some(room_code) = seed_room(server, &quiz_id, "validator-host").await else {
        println!("{} Room creation failed", "✗".red());
        return false;
    };
    println!("{} Room created: {}", "✓".green(), room_code);

    let Some(player_id) = join_player(server, &room_code, "Validator Player").await else {
        println!("{} Player join failed", "✗".red());
        return false;
    };
    println!("{} Player joined: {}", "✓".green(), player_id);

    let url = format!("http://{}/api/v1/rooms/{}/players", server, room_code);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            let players = resp.json::<serde_json::Value>().await.unwrap_or_default();
            let count = players.as_array().map(|a| a.len()).unwrap_or(0);
            if count == 1 {
                println!("{} Player list reflects the join", "✓".green());
                true
            } else {
                println!("{} Expected 1 player, got {}", "✗".red(), count);
                false
            }
        }
        _ => {
            println!("{} Player list fetch failed", "✗".red());
            false
        }
    }
}

/// Drive a whole game over the WebSocket endpoints: host starts, a player
/// answers every question, host advances to completion.
async fn validate_full_game(server: &str) -> bool {
    let Some(quiz_id) = seed_quiz(server).await else {
        println!("{} Quiz setup failed", "✗".red());
        return false;
    };
    let Some(room_code) = seed_room(server, &quiz_id, "validator-host").await else {
        println!("{} Room creation failed", "✗".red());
        return false;
    };
    let Some(player_id) = join_player(server, &room_code, "Validator Player").await else {
        println!("{} Player join failed", "✗".red());
        return false;
    };

    let host_url = format!("ws://{}/api/v1/ws/host/{}/validator-host", server, room_code);
    let player_url = format!("ws://{}/api/v1/ws/{}/{}", server, room_code, player_id);

    let Ok((host_ws, _)) = connect_async(&host_url).await else {
        println!("{} Host WebSocket connection failed", "✗".red());
        return false;
    };
    let Ok((player_ws, _)) = connect_async(&player_url).await else {
        println!("{} Player WebSocket connection failed", "✗".red());
        return false;
    };
    println!("{} Host and player connected", "✓".green());

    let (mut host_write, mut host_read) = host_ws.split();
    let (mut player_write, mut player_read) = player_ws.split();

    if host_write
        .send(Message::Text(json!({ "type": "start_game" }).to_string()))
        .await
        .is_err()
    {
        println!("{} Failed to send start_game", "✗".red());
        return false;
    }

    let mut questions_answered = 0;
    loop {
        let event = match timeout(Duration::from_secs(5), player_read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                serde_json::from_str::<serde_json::Value>(&text).unwrap_or_default()
            }
            Ok(Some(Ok(_))) => continue,
            _ => {
                println!("{} Event stream stalled", "✗".red());
                return false;
            }
        };

        match event["type"].as_str() {
            Some("question_started") => {
                let question = &event["data"]["question"];
                let choice_id = question["choices"][0]["id"].as_str().unwrap_or_default();
                let answer = json!({
                    "type": "answer_submitted",
                    "data": {
                        "question_id": question["id"],
                        "choice_id": choice_id,
                        "response_time": 2.5,
                    }
                });
                if player_write.send(Message::Text(answer.to_string())).await.is_err() {
                    println!("{} Failed to submit answer", "✗".red());
                    return false;
                }
                questions_answered += 1;
            }
            Some("answer_result") => {
                // The answer landed; have the host advance
                let next = json!({ "type": "next_question" });
                if host_write.send(Message::Text(next.to_string())).await.is_err() {
                    println!("{} Failed to advance", "✗".red());
                    return false;
                }
            }
            Some("game_ended") => {
                println!(
                    "{} Game completed after {} questions",
                    "✓".green(),
                    questions_answered
                );
                let ranked = event["data"]["final_leaderboard"]["players"]
                    .as_array()
                    .map(|a| !a.is_empty())
                    .unwrap_or(false);
                if !ranked {
                    println!("{} Final leaderboard empty", "✗".red());
                    return false;
                }
                println!("{} Final leaderboard populated", "✓".green());
                break;
            }
            _ => continue,
        }
    }

    // Host should have seen the per-answer notifications
    let mut host_saw_answer = false;
    while let Ok(Some(Ok(Message::Text(text)))) =
        timeout(Duration::from_millis(500), host_read.next()).await
    {
        if let Ok(event) = serde_json::from_str::<serde_json::Value>(&text) {
            if event["type"] == "answer_submitted" {
                host_saw_answer = true;
            }
        }
    }
    if host_saw_answer {
        println!("{} Host received answer notifications", "✓".green());
    } else {
        println!("{} Host missed answer notifications", "✗".red());
    }
    host_saw_answer
}

async fn validate_invalid_room(server: &str) -> bool {
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/v1/rooms/ZZZZZZ/join", server);
    match client.post(&url).json(&json!({ "nickname": "Nobody" })).send().await {
        Ok(resp) if resp.status() == 404 => {
            println!("{} Nonexistent room rejected with 404", "✓".green());
            true
        }
        Ok(resp) => {
            println!("{} Expected 404, got {}", "✗".red(), resp.status());
            false
        }
        Err(e) => {
            println!("{} Request failed: {}", "✗".red(), e);
            false
        }
    }
}

async fn validate_duplicate_answer(server: &str) -> bool {
    let Some(quiz_id) = seed_quiz(server).await else {
        println!("{} Quiz setup failed", "✗".red());
        return false;
    };
    let Some(room_code) = seed_room(server, &quiz_id, "validator-host").await else {
        println!("{} Room creation failed", "✗".red());
        return false;
    };
    let Some(player_id) = join_player(server, &room_code, "Repeater").await else {
        println!("{} Player join failed", "✗".red());
        return false;
    };

    // Start over HTTP, answer twice over the player socket
    let client = reqwest::Client::new();
    let start_url = format!("http://{}/api/v1/rooms/{}/start", server, room_code);
    let started = client
        .post(&start_url)
        .json(&json!({ "host_id": "validator-host" }))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false);
    if !started {
        println!("{} Game start failed", "✗".red());
        return false;
    }

    let player_url = format!("ws://{}/api/v1/ws/{}/{}", server, room_code, player_id);
    let Ok((player_ws, _)) = connect_async(&player_url).await else {
        println!("{} Player WebSocket connection failed", "✗".red());
        return false;
    };
    let (mut write, mut read) = player_ws.split();

    // First frame is the resynced current question
    let question = loop {
        match timeout(Duration::from_secs(5), read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let event = serde_json::from_str::<serde_json::Value>(&text).unwrap_or_default();
                if event["type"] == "question_started" {
                    break event["data"]["question"].clone();
                }
            }
            Ok(Some(Ok(_))) => continue,
            _ => {
                println!("{} Never received the current question", "✗".red());
                return false;
            }
        }
    };

    let answer = json!({
        "type": "answer_submitted",
        "data": {
            "question_id": question["id"],
            "choice_id": question["choices"][0]["id"],
        }
    });
    for _ in 0..2 {
        if write.send(Message::Text(answer.to_string())).await.is_err() {
            println!("{} Failed to send answer", "✗".red());
            return false;
        }
    }

    // Expect one answer_result and one DUPLICATE_ANSWER error
    let mut got_result = false;
    let mut got_duplicate = false;
    while let Ok(Some(Ok(Message::Text(text)))) =
        timeout(Duration::from_secs(2), read.next()).await
    {
        let event = serde_json::from_str::<serde_json::Value>(&text).unwrap_or_default();
        match event["type"].as_str() {
            Some("answer_result") => got_result = true,
            Some("error") if event["data"]["error_code"] == "DUPLICATE_ANSWER" => {
                got_duplicate = true
            }
            _ => {}
        }
        if got_result && got_duplicate {
            break;
        }
    }

    if got_result && got_duplicate {
        println!("{} First answer accepted, repeat rejected", "✓".green());
        true
    } else {
        println!(
            "{} Expected accept + duplicate rejection (accepted: {}, rejected: {})",
            "✗".red(),
            got_result,
            got_duplicate
        );
        false
    }
}
