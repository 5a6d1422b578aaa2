// Debate Server CLI Validation Tool
// Drives the HTTP endpoints and both WebSocket channels to validate a running server

use clap::{Parser, Subcommand};
use colored::*;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "debate-cli")]
#[command(about = "Debate Server CLI Validation Tool", long_about = None)]
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

    /// List debate rooms
    Rooms,

    /// Create a debate room
    CreateRoom {
        /// Room title
        #[arg(short, long)]
        title: String,

        /// Debate topic
        #[arg(long)]
        topic: String,

        /// Creator nickname (seats debater A)
        #[arg(short, long)]
        nickname: String,

        /// Keywords, comma separated
        #[arg(short, long)]
        keywords: Option<String>,
    },

    /// Claim the debater B seat in a room
    Join {
        /// Room ID to join
        #[arg(short, long)]
        room_id: i64,

        /// Nickname
        #[arg(short, long)]
        nickname: String,
    },

    /// Send READY for a debater
    Ready {
        #[arg(short, long)]
        room_id: i64,

        #[arg(short, long)]
        nickname: String,
    },

    /// Send a debate statement as the turn holder
    Send {
        #[arg(short, long)]
        room_id: i64,

        #[arg(short, long)]
        nickname: String,

        /// Statement text
        #[arg(short, long)]
        text: String,
    },

    /// Send a spectator chat line
    Chat {
        #[arg(short, long)]
        room_id: i64,

        #[arg(short, long)]
        nickname: String,

        #[arg(short, long)]
        text: String,
    },

    /// Watch a room's debate channel and print every frame
    Watch {
        #[arg(short, long)]
        room_id: i64,

        /// Watch the spectator chat channel instead
        #[arg(short, long)]
        chat: bool,
    },

    /// Run the automated happy-path scenario against a running server
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => {
            check_health(&cli.server).await;
        }
        Commands::Rooms => {
            list_rooms(&cli.server).await;
        }
        Commands::CreateRoom {
            title,
            topic,
            nickname,
            keywords,
        } => {
            create_room(&cli.server, title, topic, nickname, keywords.as_deref()).await;
        }
        Commands::Join { room_id, nickname } => {
            join_room(&cli.server, *room_id, nickname).await;
        }
        Commands::Ready { room_id, nickname } => {
            send_protocol(&cli.server, *room_id, nickname, "READY", "").await;
        }
        Commands::Send {
            room_id,
            nickname,
            text,
        } => {
            send_protocol(&cli.server, *room_id, nickname, "CHAT", text).await;
        }
        Commands::Chat {
            room_id,
            nickname,
            text,
        } => {
            send_chat(&cli.server, *room_id, nickname, text).await;
        }
        Commands::Watch { room_id, chat } => {
            watch_room(&cli.server, *room_id, *chat).await;
        }
        Commands::Validate => {
            run_validation(&cli.server).await;
        }
    }
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/health", server);
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

async fn list_rooms(server: &str) {
    let url = format!("http://{}/api/rooms", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let rooms: Vec<serde_json::Value> = resp.json().await.unwrap_or_default();
            if rooms.is_empty() {
                println!("{}", "No rooms".yellow());
                return;
            }
            for room in rooms {
                println!(
                    "{} {} / {} (started: {}, participants: {})",
                    room["roomId"],
                    room["title"].as_str().unwrap_or("?").bold(),
                    room["topic"].as_str().unwrap_or("?"),
                    room["started"],
                    room["currentParticipants"]
                );
            }
        }
        Ok(resp) => println!("{} Listing failed: {}", "✗".red(), resp.status()),
        Err(e) => println!("{} Cannot connect to server: {}", "✗".red(), e),
    }
}

async fn create_room(
    server: &str,
    title: &str,
    topic: &str,
    nickname: &str,
    keywords: Option<&str>,
) {
    println!("{}", "Creating room...".cyan());

    let keywords: Vec<String> = keywords
        .map(|k| k.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let url = format!("http://{}/api/rooms", server);
    let client = reqwest::Client::new();
    let body = json!({
        "title": title,
        "topic": topic,
        "keywords": keywords,
        "nickname": nickname,
    });

    match client.post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => {
            let room: serde_json::Value = resp.json().await.unwrap_or_default();
            println!("{} Room created successfully!", "✓".green());
            println!("\n{}", "═".repeat(50).green());
            println!("{} {}", "Room ID:".bold(), room["roomId"].to_string().green().bold());
            println!("{}", "═".repeat(50).green());
        }
        Ok(resp) => println!("{} Creation failed: {}", "✗".red(), resp.status()),
        Err(e) => println!("{} Cannot connect to server: {}", "✗".red(), e),
    }
}

async fn join_room(server: &str, room_id: i64, nickname: &str) {
    let url = format!("http://{}/api/rooms/{}/join", server, room_id);
    let client = reqwest::Client::new();

    match client.post(&url).json(&json!({ "nickname": nickname })).send().await {
        Ok(resp) if resp.status().is_success() => {
            println!("{} Joined room {} as debater B", "✓".green(), room_id);
        }
        Ok(resp) => {
            let status = resp.status();
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            println!(
                "{} Join failed ({}): {}",
                "✗".red(),
                status,
                body["error"].as_str().unwrap_or("unknown")
            );
        }
        Err(e) => println!("{} Cannot connect to server: {}", "✗".red(), e),
    }
}

/// Open the debate channel, send one protocol envelope, print the immediate
/// responses.
async fn send_protocol(server: &str, room_id: i64, nickname: &str, kind: &str, content: &str) {
    let url = format!("ws://{}/ws/debate/{}", server, room_id);

    let (ws_stream, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} WebSocket connection failed: {}", "✗".red(), e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let msg = json!({
        "type": kind,
        "content": content,
        "sender": nickname,
        "roomId": room_id,
    });

    if write.send(Message::Text(msg.to_string())).await.is_err() {
        println!("{} Failed to send {} message", "✗".red(), kind);
        return;
    }
    println!("{} {} sent", "✓".green(), kind);

    // Print whatever arrives in the next second (snapshot + any reactions).
    loop {
        match timeout(Duration::from_secs(1), read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => println!("  {}", text),
            Ok(Some(Ok(_))) => {}
            _ => break,
        }
    }
}

async fn send_chat(server: &str, room_id: i64, nickname: &str, text: &str) {
    let url = format!("ws://{}/ws/chat/{}", server, room_id);

    let (ws_stream, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} WebSocket connection failed: {}", "✗".red(), e);
            return;
        }
    };
    let (mut write, _read) = ws_stream.split();

    let msg = json!({
        "type": "CHAT",
        "content": text,
        "sender": nickname,
        "roomId": room_id,
    });

    match write.send(Message::Text(msg.to_string())).await {
        Ok(()) => println!("{} Chat line sent", "✓".green()),
        Err(e) => println!("{} Failed to send chat: {}", "✗".red(), e),
    }
}

async fn watch_room(server: &str, room_id: i64, chat: bool) {
    let channel = if chat { "chat" } else { "debate" };
    let url = format!("ws://{}/ws/{}/{}", server, channel, room_id);
    println!("{} {}", "Watching".cyan(), url);

    let (ws_stream, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} WebSocket connection failed: {}", "✗".red(), e);
            return;
        }
    };
    let (_write, mut read) = ws_stream.split();

    while let Some(Ok(message)) = read.next().await {
        if let Message::Text(text) = message {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(frame) => {
                    let kind = frame["type"].as_str().unwrap_or("STATUS");
                    let line = format!("[{}] {}", kind, frame);
                    match kind {
                        "ERROR" => println!("{}", line.red()),
                        "TURN" | "START" => println!("{}", line.green()),
                        "END" => println!("{}", line.yellow()),
                        _ => println!("{}", line),
                    }
                }
                Err(_) => println!("{}", text),
            }
        }
    }
    println!("{}", "Connection closed".yellow());
}

/// End-to-end happy path: create, seat B, double READY, statement, turn flip.
async fn run_validation(server: &str) {
    println!("{}", "Running validation scenario...".cyan().bold());
    let client = reqwest::Client::new();

    // 1. create a room
    let resp = client
        .post(format!("http://{}/api/rooms", server))
        .json(&json!({
            "title": "CLI validation",
            "topic": "does it work",
            "keywords": ["cli"],
            "nickname": "cli-alice",
        }))
        .send()
        .await;
    let room: serde_json::Value = match resp {
        Ok(r) if r.status().is_success() => r.json().await.unwrap_or_default(),
        _ => {
            println!("{} Could not create room", "✗".red());
            return;
        }
    };
    let room_id = room["roomId"].as_i64().unwrap_or_default();
    println!("{} Room {} created", "✓".green(), room_id);

    // 2. seat debater B
    let joined = client
        .post(format!("http://{}/api/rooms/{}/join", server, room_id))
        .json(&json!({ "nickname": "cli-bob" }))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false);
    if !joined {
        println!("{} Could not seat debater B", "✗".red());
        return;
    }
    println!("{} Debater B seated", "✓".green());

    // 3. drive the protocol over one debate-channel connection
    let url = format!("ws://{}/ws/debate/{}", server, room_id);
    let (ws_stream, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} WebSocket connection failed: {}", "✗".red(), e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    for (sender, kind, content) in [
        ("cli-alice", "READY", ""),
        ("cli-bob", "READY", ""),
        ("cli-alice", "CHAT", "opening statement"),
    ] {
        let msg = json!({
            "type": kind,
            "content": content,
            "sender": sender,
            "roomId": room_id,
        });
        if write.send(Message::Text(msg.to_string())).await.is_err() {
            println!("{} Failed to send {}", "✗".red(), kind);
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }

    let mut saw_start = false;
    let mut saw_turn_flip = false;
    while let Ok(Some(Ok(Message::Text(text)))) =
        timeout(Duration::from_secs(2), read.next()).await
    {
        if let Ok(frame) = serde_json::from_str::<serde_json::Value>(&text) {
            match frame["type"].as_str() {
                Some("START") => saw_start = true,
                Some("TURN") if frame["content"] == "cli-bob" => saw_turn_flip = true,
                _ => {}
            }
        }
        if saw_start && saw_turn_flip {
            break;
        }
    }

    if saw_start && saw_turn_flip {
        println!("{} Debate started and the turn flipped to debater B", "✓".green());
        println!("{}", "Validation passed".green().bold());
    } else {
        println!(
            "{} Missing events (start: {}, turn flip: {})",
            "✗".red(),
            saw_start,
            saw_turn_flip
        );
    }
}
