//! Game Events
//!
//! Domain events produced by the simulation, the wire shapes the client
//! transport broadcasts per room, and the envelope used on the shared
//! pub/sub channel between server instances.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::grid::{Direction, Point};
use crate::game::state::{BoardState, Player};

// =============================================================================
// WIRE SHAPES
// =============================================================================

/// Kind tag of a board-carrying event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoardEventKind {
    /// Match started; first full snapshot.
    Start,
    /// Per-tick snapshot broadcast.
    Update,
    /// A player was eliminated this tick.
    Collision,
    /// A player ate a fruit this tick.
    Fruit,
    /// Match finished; last full snapshot.
    End,
}

/// Room-scoped broadcast carrying the full snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: BoardEventKind,
    /// Affected player, when the event is about one.
    pub player: Option<String>,
    /// Snapshot after this tick's mutation.
    pub board: BoardState,
}

/// Player roster entry inside a score broadcast.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    /// Player name.
    pub name: String,
    /// Snake color.
    pub color: String,
    /// Snake body, head first.
    pub snake: Vec<Point>,
    /// Current heading.
    pub direction: Direction,
    /// Current score.
    pub score: u32,
    /// Still alive?
    pub alive: bool,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            name: player.name.clone(),
            color: player.color.clone(),
            snake: player.snake.iter().copied().collect(),
            direction: player.direction,
            score: player.score,
            alive: player.alive,
        }
    }
}

/// Full-roster score broadcast, sent whenever any score changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    /// Always `SCORE_UPDATE`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Room this roster belongs to.
    pub room_id: String,
    /// Every player in the room with current scores.
    pub players: Vec<PlayerSummary>,
}

/// Summary emitted once per elimination, consumed by the statistics
/// collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEliminatedEvent {
    /// Eliminated player.
    pub username: String,
    /// Room the elimination happened in.
    pub room_id: String,
    /// Score at the moment of elimination.
    pub final_score: u32,
    /// Standing at the moment of elimination (1 = first).
    pub position: u32,
}

/// One player's line in the finished-match summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    /// Player name.
    pub username: String,
    /// Final score.
    pub final_score: u32,
    /// Rank by descending score; ties share a position.
    pub position: u32,
    /// Mode-dependent winner flag.
    pub won: bool,
}

/// Terminal summary, emitted exactly once per finished room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFinishedEvent {
    /// Finished room.
    pub room_id: String,
    /// Final standings for every player, alive or not.
    pub results: Vec<PlayerResult>,
}

// =============================================================================
// EVENT SUM TYPE
// =============================================================================

/// Everything the relay can carry, one variant per wire kind.
///
/// Dispatch is an exhaustive match on this enum; the string tags only
/// exist at the envelope boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// `{type, player?, board}` room broadcast.
    Board(BoardEvent),
    /// `{type: SCORE_UPDATE, roomId, players}` roster broadcast.
    Score(ScoreEvent),
    /// Per-elimination summary.
    Eliminated(PlayerEliminatedEvent),
    /// Finished-match summary.
    Finished(GameFinishedEvent),
}

impl GameEvent {
    /// Board event constructor.
    pub fn board(kind: BoardEventKind, player: Option<String>, board: BoardState) -> Self {
        GameEvent::Board(BoardEvent { kind, player, board })
    }

    /// Roster score broadcast for `board`.
    pub fn score_update(board: &BoardState) -> Self {
        GameEvent::Score(ScoreEvent {
            kind: "SCORE_UPDATE".to_string(),
            room_id: board.room_id.clone(),
            players: board.players.values().map(PlayerSummary::from).collect(),
        })
    }

    /// Elimination summary.
    pub fn eliminated(username: &str, room_id: &str, final_score: u32, position: u32) -> Self {
        GameEvent::Eliminated(PlayerEliminatedEvent {
            username: username.to_string(),
            room_id: room_id.to_string(),
            final_score,
            position,
        })
    }

    /// Finished-match summary.
    pub fn finished(room_id: &str, results: Vec<PlayerResult>) -> Self {
        GameEvent::Finished(GameFinishedEvent {
            room_id: room_id.to_string(),
            results,
        })
    }

    /// Room this event belongs to. Board events derive it from the embedded
    /// snapshot; the rest carry their own room field.
    pub fn room_id(&self) -> &str {
        match self {
            GameEvent::Board(e) => &e.board.room_id,
            GameEvent::Score(e) => &e.room_id,
            GameEvent::Eliminated(e) => &e.room_id,
            GameEvent::Finished(e) => &e.room_id,
        }
    }

    /// String tag used on the shared channel.
    pub fn event_type(&self) -> &'static str {
        match self {
            GameEvent::Board(_) => "GameEvent",
            GameEvent::Score(_) => "ScoreEvent",
            GameEvent::Eliminated(_) => "PlayerEliminatedEvent",
            GameEvent::Finished(_) => "GameFinishedEvent",
        }
    }

    fn payload(&self) -> serde_json::Result<Value> {
        match self {
            GameEvent::Board(e) => serde_json::to_value(e),
            GameEvent::Score(e) => serde_json::to_value(e),
            GameEvent::Eliminated(e) => serde_json::to_value(e),
            GameEvent::Finished(e) => serde_json::to_value(e),
        }
    }
}

// =============================================================================
// CHANNEL ENVELOPE
// =============================================================================

/// Wrapper published on the shared `game-events` channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Tag the subscribe path dispatches on.
    pub event_type: String,
    /// Publish time, epoch milliseconds.
    pub timestamp: i64,
    /// Instance that published the event. The originating instance already
    /// delivered locally, so its subscriber skips its own envelopes.
    /// Absent on messages from pre-envelope peers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Uuid>,
    /// The event itself, shaped per `event_type`.
    pub payload: Value,
}

/// Serialize one event into its channel representation.
pub fn encode_channel_message(event: &GameEvent, origin: Uuid) -> serde_json::Result<String> {
    let envelope = EventEnvelope {
        event_type: event.event_type().to_string(),
        timestamp: Utc::now().timestamp_millis(),
        origin: Some(origin),
        payload: event.payload()?,
    };
    serde_json::to_string(&envelope)
}

/// Outcome of decoding one channel message.
#[derive(Debug)]
pub enum DecodedEvent {
    /// A recognized event; `origin` is absent for legacy payloads.
    Known {
        /// Publishing instance, when the envelope carried one.
        origin: Option<Uuid>,
        /// The decoded event.
        event: GameEvent,
    },
    /// Parsed fine, but the tag (or legacy shape) is not one of ours.
    Unrecognized {
        /// The offending tag, for the log line.
        event_type: String,
    },
}

/// Decode a channel message: enveloped first, then legacy shapes by field
/// presence (rolling-upgrade compatibility).
pub fn decode_channel_message(raw: &str) -> serde_json::Result<DecodedEvent> {
    let root: Value = serde_json::from_str(raw)?;

    if root.get("eventType").is_some() && root.get("payload").is_some() {
        let envelope: EventEnvelope = serde_json::from_value(root)?;
        let event = match envelope.event_type.as_str() {
            "GameEvent" => GameEvent::Board(serde_json::from_value(envelope.payload)?),
            "ScoreEvent" => GameEvent::Score(serde_json::from_value(envelope.payload)?),
            "PlayerEliminatedEvent" => {
                GameEvent::Eliminated(serde_json::from_value(envelope.payload)?)
            }
            "GameFinishedEvent" => GameEvent::Finished(serde_json::from_value(envelope.payload)?),
            other => {
                return Ok(DecodedEvent::Unrecognized {
                    event_type: other.to_string(),
                })
            }
        };
        return Ok(DecodedEvent::Known {
            origin: envelope.origin,
            event,
        });
    }

    // Legacy untyped payloads, identified by field presence.
    let event = if root.get("players").is_some() && root.get("roomId").is_some() {
        GameEvent::Score(serde_json::from_value(root)?)
    } else if root.get("results").is_some() && root.get("roomId").is_some() {
        GameEvent::Finished(serde_json::from_value(root)?)
    } else if root.get("type").is_some() && root.get("board").is_some() {
        GameEvent::Board(serde_json::from_value(root)?)
    } else {
        return Ok(DecodedEvent::Unrecognized {
            event_type: "<untyped>".to_string(),
        });
    };

    Ok(DecodedEvent::Known {
        origin: None,
        event,
    })
}
