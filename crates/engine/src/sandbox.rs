use crate::error::SandboxError;
use crate::events::{EventBus, Signal};
use botscope_protocol::{Entity, Snapshot};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Selection {
    snapshot: Option<Arc<Snapshot>>,
    selected: Option<String>,
}

/// Latest sandbox snapshot plus the entity the user is looking at.
///
/// The selection is kept by id only and looked up in whichever snapshot is
/// current, so it survives turns as long as the entity does.
///
/// Updates are serialized together with their signals, so listeners see each
/// update's signals as one uninterrupted pair. Listeners may read the model but
/// must not update it from inside a handler.
#[derive(Debug, Clone)]
pub struct SandboxModel {
    bus: EventBus,
    inner: Arc<Mutex<Selection>>,
    updates: Arc<Mutex<()>>,
}

impl SandboxModel {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            inner: Arc::new(Mutex::new(Selection::default())),
            updates: Arc::new(Mutex::new(())),
        }
    }

    /// Installs `snapshot` and re-resolves the selection: the previously selected
    /// entity if it is still there, otherwise the first master.
    ///
    /// On error nothing is installed and no signal fires.
    pub fn set_state(&self, snapshot: Snapshot) -> Result<(), SandboxError> {
        let _update = self.begin_update();
        let (snapshot, entity) = {
            let mut inner = self.lock();
            let entity = inner
                .selected
                .as_deref()
                .and_then(|id| snapshot.find(id))
                .or_else(|| snapshot.master())
                .cloned()
                .ok_or(SandboxError::NoMasterEntity {
                    entities: snapshot.entities.len(),
                })?;
            let snapshot = Arc::new(snapshot);
            inner.snapshot = Some(Arc::clone(&snapshot));
            inner.selected = Some(entity.id.clone());
            (snapshot, entity)
        };

        self.bus.publish(Signal::SandboxStateChanged(snapshot));
        self.bus.publish(Signal::EntitySelectionChanged(entity));
        Ok(())
    }

    pub fn state(&self) -> Option<Arc<Snapshot>> {
        self.lock().snapshot.clone()
    }

    /// Returns `false` and leaves the selection alone when `id` is not in the
    /// current snapshot.
    pub fn set_selected_entity_by_id(&self, id: &str) -> bool {
        let _update = self.begin_update();
        let entity = {
            let mut inner = self.lock();
            let Some(entity) = inner.snapshot.as_ref().and_then(|s| s.find(id)).cloned() else {
                return false;
            };
            inner.selected = Some(entity.id.clone());
            entity
        };
        self.bus.publish(Signal::EntitySelectionChanged(entity));
        true
    }

    pub fn selected_entity(&self) -> Option<Entity> {
        let inner = self.lock();
        let id = inner.selected.as_deref()?;
        inner.snapshot.as_ref()?.find(id).cloned()
    }

    pub fn selected_entity_view(&self) -> Option<String> {
        self.selected_entity()
            .and_then(|e| e.view().map(str::to_string))
    }

    fn lock(&self) -> MutexGuard<'_, Selection> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Held from install until the last signal is delivered; the data lock is not.
    fn begin_update(&self) -> MutexGuard<'_, ()> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
