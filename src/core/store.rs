use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::core::error::TransitionError;
use crate::state::{PhaseChange, Transition, WorkflowState};

const EVENT_CAPACITY: usize = 64;

/// Shared handle to the workflow state.
///
/// Writers go through [`WorkflowStore::apply`]; each applied transition is
/// published to subscribers. The lock is never held across an `.await`.
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    state: Arc<Mutex<WorkflowState>>,
    events: broadcast::Sender<PhaseChange>,
}

impl WorkflowStore {
    pub fn new(state: WorkflowState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(state)),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseChange> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.lock().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&WorkflowState) -> R) -> R {
        f(&self.lock())
    }

    pub fn apply(&self, transition: Transition) -> Result<PhaseChange, TransitionError> {
        self.apply_then(transition, |_| ()).map(|(change, _)| change)
    }

    /// Applies a transition and reads the resulting state under the same lock.
    pub fn apply_then<R>(
        &self,
        transition: Transition,
        read: impl FnOnce(&WorkflowState) -> R,
    ) -> Result<(PhaseChange, R), TransitionError> {
        let (change, value) = {
            let mut state = self.lock();
            let change = state.apply(transition)?;
            (change, read(&state))
        };
        // No receivers is fine: nothing is rendering.
        let _ = self.events.send(change);
        Ok((change, value))
    }
}
