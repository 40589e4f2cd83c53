use crate::backend::SimulationBackend;
use crate::botview::{Frame, GridRenderer};
use crate::config::DebuggerConfig;
use crate::error::{AdvanceError, BackendError};
use crate::events::EventBus;
use crate::inspect::Inspection;
use crate::playback::{advance_sandbox, ErrorHandler, PlaybackScheduler};
use crate::sandbox::SandboxModel;
use botscope_protocol::WorldConfig;
use std::sync::Arc;

/// One debugging session against a sandbox: the model, its playback and the
/// backend they both talk to.
#[derive(Debug, Clone)]
pub struct Debugger {
    bus: EventBus,
    sandbox: SandboxModel,
    playback: PlaybackScheduler,
    backend: Arc<dyn SimulationBackend>,
    renderer: GridRenderer,
    world: WorldConfig,
}

impl Debugger {
    pub fn new(
        config: &DebuggerConfig,
        backend: Arc<dyn SimulationBackend>,
        on_error: ErrorHandler,
    ) -> Self {
        let bus = EventBus::new();
        let sandbox = SandboxModel::new(bus.clone());
        let playback = PlaybackScheduler::new(
            bus.clone(),
            sandbox.clone(),
            Arc::clone(&backend),
            config.playback_interval(),
            config.playback_steps,
            on_error,
        );
        Self {
            bus,
            sandbox,
            playback,
            backend,
            renderer: config.renderer(),
            world: config.world.clone(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn sandbox(&self) -> &SandboxModel {
        &self.sandbox
    }

    pub fn playback(&self) -> &PlaybackScheduler {
        &self.playback
    }

    /// Opens the debugger on the sandbox's next turn.
    pub async fn show(&self) -> Result<(), AdvanceError> {
        self.step(1).await
    }

    /// Manual advance; playback state is left alone.
    pub async fn step(&self, steps: u32) -> Result<(), AdvanceError> {
        advance_sandbox(self.backend.as_ref(), &self.sandbox, steps).await
    }

    /// Replaces the running sandbox with a fresh one built from the configured world.
    pub async fn restart(&self) -> Result<(), AdvanceError> {
        self.playback.stop();
        let snapshot = self.backend.create_sandbox(&self.world).await?;
        self.sandbox.set_state(snapshot)?;
        tracing::info!("sandbox restarted");
        Ok(())
    }

    /// Starts a fresh sandbox and opens the debugger on its next turn.
    pub async fn open(&self) -> Result<(), AdvanceError> {
        self.restart().await?;
        self.show().await
    }

    pub async fn close(&self) -> Result<(), BackendError> {
        self.playback.stop();
        self.backend.destroy_sandboxes().await
    }

    pub fn toggle_playback(&self) -> bool {
        self.playback.toggle()
    }

    pub fn select(&self, id: &str) -> bool {
        self.sandbox.set_selected_entity_by_id(id)
    }

    /// The selected entity's view. Malformed views come back as an empty canvas.
    pub fn bot_view(&self) -> Frame {
        let view = self.sandbox.selected_entity_view();
        match self.renderer.render(view.as_deref()) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "cannot render bot view");
                self.renderer.blank()
            }
        }
    }

    pub fn inspect(&self) -> Option<Inspection> {
        self.sandbox.selected_entity().as_ref().map(Inspection::of)
    }
}
