use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::config::WorldConfig;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// === Room state (inbound snapshots from the room transport) ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    #[serde(default)]
    pub players: HashMap<String, PlayerState>,
    #[serde(default)]
    pub planets: HashMap<String, PlanetState>,
    #[serde(default)]
    pub black_holes: HashMap<String, BlackHoleState>,
}

/// A remote player as the room reports it. Absent fields mean "no update".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub position: Option<[f64; 2]>,
    #[serde(default)]
    pub destination: Option<[f64; 2]>,
    #[serde(default)]
    pub planets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PlanetState {
    pub position: [f64; 2],
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BlackHoleState {
    pub position: [f64; 2],
}

/// Outbound intent for the local player, `{position}` or `{destination}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(untagged)]
pub enum Intent {
    Destination { destination: [f64; 2] },
    Position { position: [f64; 2] },
}

// === Host -> Collaborator ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "frame")]
    Frame(FrameMsg),
    #[serde(rename = "intent")]
    Intent(IntentMsg),
    #[serde(rename = "event")]
    Event(EventMsg),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    /// Key of the local player when a game is already running.
    pub self_key: Option<String>,
    pub config: WorldConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct FrameMsg {
    pub frame: u32,
    pub followed: Option<String>,
    pub players: Vec<StarWire>,
    pub black_holes: Vec<BlackHoleWire>,
    pub planets: Vec<BodyWire>,
    pub dusts: Vec<BodyWire>,
    /// Present only when the height field changed since the last frame message.
    pub grid: Option<GridWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct StarWire {
    pub key: String,
    pub name: String,
    pub category: String,
    pub position: [f64; 2],
    pub size: f64,
    pub color: u32,
    pub visible: bool,
    pub dead: bool,
    pub planets: Vec<String>,
    pub absorbing: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BlackHoleWire {
    pub key: String,
    pub position: [f64; 2],
    pub gravity_field: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BodyWire {
    pub key: String,
    pub position: [f64; 2],
    pub size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct GridWire {
    pub center: [f64; 2],
    pub step: f64,
    pub detail: u32,
    /// Row-major heights, `detail × detail`.
    pub heights: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct IntentMsg {
    pub key: String,
    pub intent: Intent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Sound,
    Show,
    Hide,
    Died,
    Captured,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct EventMsg {
    pub kind: EventKind,
    pub key: Option<String>,
    /// Sound name, death cause or captured entity key.
    pub detail: Option<String>,
}

// === Collaborator -> Host ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "start")]
    Start { category: String, name: String },
    #[serde(rename = "catch")]
    Catch { x: f64, y: f64 },
    #[serde(rename = "accelerate")]
    Accelerate,
    #[serde(rename = "room_state")]
    RoomState(RoomSnapshot),
    #[serde(rename = "set_check")]
    SetCheck { enabled: bool },
    #[serde(rename = "leave")]
    Leave,
}

// === Conversion helpers ===

/// Round to 2 decimal places (world units are large; keeps frames small)
#[inline]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_serializes_as_bare_field() {
        let dest = Intent::Destination { destination: [1.0, 0.0] };
        assert_eq!(serde_json::to_string(&dest).unwrap(), r#"{"destination":[1.0,0.0]}"#);
        let pos = Intent::Position { position: [3.5, -2.0] };
        assert_eq!(serde_json::to_string(&pos).unwrap(), r#"{"position":[3.5,-2.0]}"#);

        let parsed: Intent = serde_json::from_str(r#"{"position":[1,2]}"#).unwrap();
        assert_eq!(parsed, Intent::Position { position: [1.0, 2.0] });
    }

    #[test]
    fn room_state_with_missing_fields_parses() {
        let json = r#"{
            "type": "room_state",
            "players": { "abc": { "name": "zed", "destination": [0.5, 0.5] } },
            "blackHoles": { "bh1": { "position": [10, 20] } }
        }"#;
        let parsed: ClientMsg = serde_json::from_str(json).unwrap();
        match parsed {
            ClientMsg::RoomState(snapshot) => {
                assert!(snapshot.planets.is_empty());
                let player = &snapshot.players["abc"];
                assert_eq!(player.destination, Some([0.5, 0.5]));
                assert_eq!(player.position, None);
                assert_eq!(player.size, None);
                assert!(player.planets.is_empty());
                assert_eq!(snapshot.black_holes["bh1"].position, [10.0, 20.0]);
            }
            other => panic!("Expected RoomState, got {:?}", other),
        }
    }

    #[test]
    fn server_msg_welcome_carries_config() {
        let msg = ServerMsg::Welcome(WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            server_version: "0.1.0".to_string(),
            self_key: None,
            config: WorldConfig::default(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"welcome\""));
        assert!(json.contains("\"protocolVersion\":1"));
        assert!(json.contains("\"gravityRatio\":10.0"));
    }

    #[test]
    fn event_kind_is_snake_case() {
        let msg = ServerMsg::Event(EventMsg {
            kind: EventKind::Died,
            key: Some("k".to_string()),
            detail: Some("black_hole".to_string()),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"event\""));
        assert!(json.contains("\"kind\":\"died\""));
    }

    #[test]
    fn client_msg_unit_variants() {
        let parsed: ClientMsg = serde_json::from_str(r#"{"type":"accelerate"}"#).unwrap();
        assert!(matches!(parsed, ClientMsg::Accelerate));
        let parsed: ClientMsg =
            serde_json::from_str(r#"{"type":"set_check","enabled":false}"#).unwrap();
        assert!(matches!(parsed, ClientMsg::SetCheck { enabled: false }));
    }

    #[test]
    fn round2_trims_precision() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-0.006), -0.01);
    }
}
