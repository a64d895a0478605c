use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use warp::ws::Message;

use crate::error::Result;
use crate::game::messages::ServerEvent;

pub type EventSender = mpsc::UnboundedSender<Message>;

struct PlayerConnection {
    sender: EventSender,
    nickname: String,
}

#[derive(Default)]
struct RoomConnections {
    host: Option<EventSender>,
    players: HashMap<String, PlayerConnection>,
}

impl RoomConnections {
    fn is_empty(&self) -> bool {
        self.host.is_none() && self.players.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectedPlayer {
    pub player_id: String,
    pub nickname: String,
}

/// Observability snapshot of a room's live connections.
#[derive(Debug, Clone, Serialize)]
pub struct RoomConnectionInfo {
    pub host_connected: bool,
    pub player_count: usize,
    pub players: Vec<ConnectedPlayer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub total_rooms: usize,
    pub hosts_connected: usize,
    pub total_players: usize,
    pub active_rooms: Vec<String>,
}

/// Tracks live transport connections per room: one optional host plus any
/// number of players. Senders are channel halves feeding per-connection
/// writer tasks, so nothing here touches the network while a lock is held.
pub struct ConnectionRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomConnections>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Register the host connection, replacing any prior one
    /// (last-writer-wins; reconnection needs no explicit disconnect).
    pub async fn register_host(&self, room_code: &str, sender: EventSender) {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_code.to_string()).or_default();
        if room.host.is_some() {
            tracing::debug!(room_code = %room_code, "Replacing existing host connection");
        }
        room.host = Some(sender);
    }

    /// Register a player connection, replacing any prior one for the same
    /// player id.
    pub async fn register_player(
        &self,
        room_code: &str,
        player_id: &str,
        nickname: &str,
        sender: EventSender,
    ) {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_code.to_string()).or_default();
        if room.players.contains_key(player_id) {
            tracing::debug!(
                room_code = %room_code,
                player_id = %player_id,
                "Replacing existing player connection"
            );
        }
        room.players.insert(
            player_id.to_string(),
            PlayerConnection {
                sender,
                nickname: nickname.to_string(),
            },
        );
    }

    /// Idempotent; no-op when no host is registered.
    pub async fn unregister_host(&self, room_code: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(room_code) {
            room.host = None;
            if room.is_empty() {
                rooms.remove(room_code);
            }
        }
    }

    /// Idempotent; returns the nickname when a connection was removed.
    pub async fn unregister_player(&self, room_code: &str, player_id: &str) -> Option<String> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_code)?;
        let removed = room.players.remove(player_id).map(|c| c.nickname);
        if room.is_empty() {
            rooms.remove(room_code);
        }
        removed
    }

    /// Best-effort directed send; a failed delivery unregisters the host.
    pub async fn send_to_host(&self, room_code: &str, event: &ServerEvent) {
        let message = match encode(event) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(room_code = %room_code, error = %e, "Failed to encode event");
                return;
            }
        };

        let sender = {
            let rooms = self.rooms.read().await;
            rooms.get(room_code).and_then(|r| r.host.clone())
        };

        if let Some(sender) = sender {
            if sender.send(message).is_err() {
                tracing::warn!(room_code = %room_code, "Host connection dead, unregistering");
                self.unregister_host(room_code).await;
            }
        }
    }

    /// Best-effort directed send; a failed delivery unregisters the player.
    pub async fn send_to_player(&self, room_code: &str, player_id: &str, event: &ServerEvent) {
        let message = match encode(event) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(room_code = %room_code, error = %e, "Failed to encode event");
                return;
            }
        };

        let sender = {
            let rooms = self.rooms.read().await;
            rooms
                .get(room_code)
                .and_then(|r| r.players.get(player_id))
                .map(|c| c.sender.clone())
        };

        if let Some(sender) = sender {
            if sender.send(message).is_err() {
                tracing::warn!(
                    room_code = %room_code,
                    player_id = %player_id,
                    "Player connection dead, unregistering"
                );
                self.unregister_player(room_code, player_id).await;
            }
        }
    }

    /// Deliver to the host and every player in the room. The recipient
    /// list is snapshotted first so one dead connection cannot block the
    /// rest; dead recipients are unregistered afterwards.
    pub async fn broadcast(&self, room_code: &str, event: &ServerEvent) {
        let message = match encode(event) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(room_code = %room_code, error = %e, "Failed to encode event");
                return;
            }
        };

        let (host, players) = {
            let rooms = self.rooms.read().await;
            match rooms.get(room_code) {
                Some(room) => (
                    room.host.clone(),
                    room.players
                        .iter()
                        .map(|(id, c)| (id.clone(), c.sender.clone()))
                        .collect::<Vec<_>>(),
                ),
                None => return,
            }
        };

        let mut host_dead = false;
        if let Some(host) = host {
            host_dead = host.send(message.clone()).is_err();
        }

        let mut dead_players = Vec::new();
        for (player_id, sender) in players {
            if sender.send(message.clone()).is_err() {
                dead_players.push(player_id);
            }
        }

        if host_dead {
            tracing::warn!(room_code = %room_code, "Host connection dead during broadcast");
            self.unregister_host(room_code).await;
        }
        for player_id in dead_players {
            tracing::warn!(
                room_code = %room_code,
                player_id = %player_id,
                "Player connection dead during broadcast"
            );
            self.unregister_player(room_code, &player_id).await;
        }
    }

    pub async fn room_snapshot(&self, room_code: &str) -> RoomConnectionInfo {
        let rooms = self.rooms.read().await;
        match rooms.get(room_code) {
            Some(room) => RoomConnectionInfo {
                host_connected: room.host.is_some(),
                player_count: room.players.len(),
                players: room
                    .players
                    .iter()
                    .map(|(id, c)| ConnectedPlayer {
                        player_id: id.clone(),
                        nickname: c.nickname.clone(),
                    })
                    .collect(),
            },
            None => RoomConnectionInfo {
                host_connected: false,
                player_count: 0,
                players: Vec::new(),
            },
        }
    }

    #[cfg(test)]
    pub async fn connected_player_count(&self, room_code: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room_code).map_or(0, |r| r.players.len())
    }

    pub async fn stats(&self) -> ConnectionStats {
        let rooms = self.rooms.read().await;
        ConnectionStats {
            total_rooms: rooms.len(),
            hosts_connected: rooms.values().filter(|r| r.host.is_some()).count(),
            total_players: rooms.values().map(|r| r.players.len()).sum(),
            active_rooms: rooms.keys().cloned().collect(),
        }
    }

    /// Drop every connection entry for a room (used on room teardown).
    pub async fn clear_room(&self, room_code: &str) {
        let mut rooms = self.rooms.write().await;
        rooms.remove(room_code);
    }
}

fn encode(event: &ServerEvent) -> Result<Message> {
    let text = serde_json::to_string(event)?;
    Ok(Message::text(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_event() -> ServerEvent {
        ServerEvent::Error {
            message: "test".into(),
            error_code: "INTERNAL_ERROR".into(),
        }
    }

    #[tokio::test]
    async fn test_register_and_snapshot() {
        let registry = ConnectionRegistry::new();
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let (p1_tx, _p1_rx) = mpsc::unbounded_channel();

        registry.register_host("ROOM01", host_tx).await;
        registry.register_player("ROOM01", "p1", "Alice", p1_tx).await;

        let info = registry.room_snapshot("ROOM01").await;
        assert!(info.host_connected);
        assert_eq!(info.player_count, 1);
        assert_eq!(info.players[0].nickname, "Alice");
    }

    #[tokio::test]
    async fn test_snapshot_of_unknown_room() {
        let registry = ConnectionRegistry::new();
        let info = registry.room_snapshot("NOPE").await;
        assert!(!info.host_connected);
        assert_eq!(info.player_count, 0);
    }

    #[tokio::test]
    async fn test_player_reconnect_replaces_sender() {
        let registry = ConnectionRegistry::new();

        let (old_tx, old_rx) = mpsc::unbounded_channel();
        registry.register_player("ROOM01", "p1", "Alice", old_tx).await;
        drop(old_rx);

        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        registry.register_player("ROOM01", "p1", "Alice", new_tx).await;

        registry.send_to_player("ROOM01", "p1", &error_event()).await;
        assert!(new_rx.try_recv().is_ok());
        assert_eq!(registry.connected_player_count("ROOM01").await, 1);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register_player("ROOM01", "p1", "Alice", tx).await;

        assert_eq!(
            registry.unregister_player("ROOM01", "p1").await,
            Some("Alice".to_string())
        );
        assert_eq!(registry.unregister_player("ROOM01", "p1").await, None);
        registry.unregister_host("ROOM01").await;
        registry.unregister_host("NOPE").await;
    }

    #[tokio::test]
    async fn test_broadcast_isolates_dead_connections() {
        let registry = ConnectionRegistry::new();

        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (alive_tx, mut alive_rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();

        registry.register_host("ROOM01", host_tx).await;
        registry.register_player("ROOM01", "alive", "Alice", alive_tx).await;
        registry.register_player("ROOM01", "dead", "Bob", dead_tx).await;
        drop(dead_rx);

        registry.broadcast("ROOM01", &error_event()).await;

        // Host and the live player still got the event
        assert!(host_rx.try_recv().is_ok());
        assert!(alive_rx.try_recv().is_ok());

        // The dead connection was pruned
        let info = registry.room_snapshot("ROOM01").await;
        assert_eq!(info.player_count, 1);
        assert!(info.players.iter().all(|p| p.player_id == "alive"));
    }

    #[tokio::test]
    async fn test_send_to_dead_host_unregisters() {
        let registry = ConnectionRegistry::new();
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        registry.register_host("ROOM01", host_tx).await;
        drop(host_rx);

        registry.send_to_host("ROOM01", &error_event()).await;
        let info = registry.room_snapshot("ROOM01").await;
        assert!(!info.host_connected);
    }

    #[tokio::test]
    async fn test_stats_and_clear_room() {
        let registry = ConnectionRegistry::new();
        let (host_tx, _a) = mpsc::unbounded_channel();
        let (p_tx, _b) = mpsc::unbounded_channel();

        registry.register_host("ROOM01", host_tx).await;
        registry.register_player("ROOM01", "p1", "Alice", p_tx).await;

        let stats = registry.stats().await;
        assert_eq!(stats.total_rooms, 1);
        assert_eq!(stats.hosts_connected, 1);
        assert_eq!(stats.total_players, 1);
        assert_eq!(stats.active_rooms, vec!["ROOM01".to_string()]);

        registry.clear_room("ROOM01").await;
        assert_eq!(registry.stats().await.total_rooms, 0);
    }
}
