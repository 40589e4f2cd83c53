use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One simulated actor (bot, mini-bot, plant, beast) as reported by the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub master: bool,
    #[serde(default)]
    pub input: EntityInput,
    #[serde(default)]
    pub output: Vec<Opcode>,
    #[serde(
        default,
        rename = "debugOutput",
        skip_serializing_if = "Option::is_none"
    )]
    pub debug_output: Option<String>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            master: false,
            input: EntityInput::default(),
            output: Vec::new(),
            debug_output: None,
        }
    }

    pub fn master(id: impl Into<String>) -> Self {
        Self {
            master: true,
            ..Self::new(id)
        }
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.input
            .params
            .insert(params::VIEW.to_string(), Value::String(view.into()));
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// The entity's local view for this turn, if it perceived anything.
    pub fn view(&self) -> Option<&str> {
        self.input.params.get(params::VIEW).and_then(Value::as_str)
    }
}

/// The parameters handed to the entity's control function this turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opcode: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// One command emitted by the control function, e.g. `Move(direction=1:0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opcode {
    pub opcode: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Opcode {
    pub fn new(opcode: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// The full sandbox state at one simulation turn. Replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Snapshot {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn find(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn master(&self) -> Option<&Entity> {
        self.entities.iter().find(|e| e.master)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRequest {
    pub steps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectRequest {
    pub id: String,
}

/// Command-line style world parameters for a new sandbox (`-x`, `-walls`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldConfig(pub BTreeMap<String, String>);

impl Default for WorldConfig {
    fn default() -> Self {
        let pairs = [
            ("-x", "50"),
            ("-y", "50"),
            ("-perimeter", "open"),
            ("-walls", "20"),
            ("-snorgs", "20"),
            ("-fluppets", "20"),
            ("-toxifera", "20"),
            ("-zugars", "20"),
        ];
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSandboxRequest {
    pub config: WorldConfig,
}

/// Named REST endpoints handed out by the platform at login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceIndex {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl ResourceIndex {
    pub fn url(&self, name: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.url.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub url: String,
}

pub mod resources {
    pub const SESSION: &str = "Session";
    pub const SOURCES: &str = "Sources";
    pub const BUILD: &str = "Build";
    pub const SANDBOXES: &str = "Sandboxes";
    pub const PUBLISH: &str = "Publish";
    pub const VERSIONS: &str = "Versions";
}

pub mod params {
    pub const VIEW: &str = "view";
    pub const NAME: &str = "name";
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "entity id must be a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_decodes_sandbox_payload() {
        let raw = r#"{
            "entities": [
                { "id": 7, "name": "Master", "master": true,
                  "input": { "opcode": "React", "params": { "generation": 0, "view": "_M_", "energy": 1000 } },
                  "output": [ { "opcode": "Move", "params": { "direction": "1:0" } } ],
                  "debugOutput": "hello" },
                { "id": "8", "master": false }
            ]
        }"#;
        let snap: Snapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snap.entities.len(), 2);
        assert_eq!(snap.entities[0].id, "7");
        assert_eq!(snap.entities[0].view(), Some("_M_"));
        assert_eq!(snap.entities[0].debug_output.as_deref(), Some("hello"));
        assert_eq!(snap.entities[1].display_name(), "8");
        assert!(snap.entities[1].input.params.is_empty());
        assert_eq!(snap.master().map(|e| e.id.as_str()), Some("7"));
        assert!(snap.find("8").is_some());
        assert!(snap.find("9").is_none());
    }

    #[test]
    fn entity_id_rejects_objects() {
        let raw = r#"{ "entities": [ { "id": { "nested": 1 } } ] }"#;
        assert!(serde_json::from_str::<Snapshot>(raw).is_err());
    }

    #[test]
    fn params_keep_received_order() {
        let raw = r#"{ "id": "a", "input": { "params": { "z": 1, "a": 2, "m": 3 } } }"#;
        let e: Entity = serde_json::from_str(raw).unwrap();
        let keys: Vec<&str> = e.input.params.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn resource_index_lookup() {
        let raw = r#"{ "resources": [
            { "name": "Session", "url": "/api/users/ann/session" },
            { "name": "Sandboxes", "url": "/api/users/ann/sandboxes" }
        ] }"#;
        let idx: ResourceIndex = serde_json::from_str(raw).unwrap();
        assert_eq!(
            idx.url(resources::SANDBOXES),
            Some("/api/users/ann/sandboxes")
        );
        assert_eq!(idx.url(resources::PUBLISH), None);
    }

    #[test]
    fn default_world_serializes_as_flat_map() {
        let req = CreateSandboxRequest {
            config: WorldConfig::default(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["config"]["-perimeter"], "open");
        assert_eq!(v["config"]["-x"], "50");
    }
}
