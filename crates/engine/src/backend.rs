use crate::error::BackendError;
use async_trait::async_trait;
use botscope_protocol::{Snapshot, WorldConfig};
use std::sync::{Mutex, PoisonError};

/// The simulation server that owns the sandbox. Every call answers with the
/// complete state of the turn it ended on.
#[async_trait]
pub trait SimulationBackend: Send + Sync {
    async fn create_sandbox(&self, world: &WorldConfig) -> Result<Snapshot, BackendError>;

    async fn advance(&self, steps: u32) -> Result<Snapshot, BackendError>;

    async fn destroy_sandboxes(&self) -> Result<(), BackendError>;
}

impl std::fmt::Debug for dyn SimulationBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SimulationBackend")
    }
}

/// Plays back a recorded list of turns instead of running a simulation.
#[derive(Debug)]
pub struct ReplayBackend {
    frames: Vec<Snapshot>,
    cursor: Mutex<Option<usize>>,
}

impl ReplayBackend {
    pub fn new(frames: Vec<Snapshot>) -> Self {
        Self {
            frames,
            cursor: Mutex::new(None),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, BackendError> {
        let frames: Vec<Snapshot> = serde_json::from_str(raw).map_err(BackendError::Decode)?;
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn position(&self) -> Option<usize> {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SimulationBackend for ReplayBackend {
    async fn create_sandbox(&self, _world: &WorldConfig) -> Result<Snapshot, BackendError> {
        let first = self.frames.first().cloned().ok_or(BackendError::NoSandbox)?;
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = Some(0);
        Ok(first)
    }

    async fn advance(&self, steps: u32) -> Result<Snapshot, BackendError> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let at = cursor.ok_or(BackendError::NoSandbox)?;
        let last = self.frames.len().saturating_sub(1);
        let next = at.saturating_add(steps as usize).min(last);
        *cursor = Some(next);
        self.frames.get(next).cloned().ok_or(BackendError::NoSandbox)
    }

    async fn destroy_sandboxes(&self) -> Result<(), BackendError> {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botscope_protocol::Entity;

    fn frames(n: usize) -> Vec<Snapshot> {
        (0..n)
            .map(|i| Snapshot::new(vec![Entity::master(format!("m{i}"))]))
            .collect()
    }

    #[tokio::test]
    async fn replay_walks_and_clamps() {
        let backend = ReplayBackend::new(frames(4));
        assert!(matches!(
            backend.advance(1).await,
            Err(BackendError::NoSandbox)
        ));

        let first = backend.create_sandbox(&WorldConfig::default()).await.unwrap();
        assert_eq!(first.entities[0].id, "m0");
        assert_eq!(backend.advance(2).await.unwrap().entities[0].id, "m2");
        assert_eq!(backend.advance(10).await.unwrap().entities[0].id, "m3");
        assert_eq!(backend.position(), Some(3));

        backend.destroy_sandboxes().await.unwrap();
        assert_eq!(backend.position(), None);
    }

    #[tokio::test]
    async fn empty_recording_has_no_sandbox() {
        let backend = ReplayBackend::new(Vec::new());
        assert!(backend.is_empty());
        assert!(matches!(
            backend.create_sandbox(&WorldConfig::default()).await,
            Err(BackendError::NoSandbox)
        ));
    }

    #[test]
    fn recording_decodes_from_json() {
        let backend = ReplayBackend::from_json(
            r#"[ { "entities": [ { "id": 1, "master": true } ] }, { "entities": [] } ]"#,
        )
        .unwrap();
        assert_eq!(backend.len(), 2);
        assert!(ReplayBackend::from_json("{").is_err());
    }
}
