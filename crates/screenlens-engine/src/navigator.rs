//! The navigation state machine.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use screenlens_ipc::{NavState, NavStateKind};

use crate::error::{NavigationError, NavigationResult};

/// A committed state change.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub previous: NavState,
    pub current: NavState,
}

/// Single authority over the current [`NavState`].
///
/// Every change goes through [`StateNavigator::request_transition`], which
/// enforces the transition table. Subscribers see each committed state
/// exactly once, in commit order.
pub struct StateNavigator {
    state: RwLock<NavState>,
    observers: Mutex<Vec<Sender<Transition>>>,
}

impl StateNavigator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(NavState::Idle),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> NavState {
        self.state.read().clone()
    }

    pub fn current_kind(&self) -> NavStateKind {
        self.state.read().kind()
    }

    /// Receive every transition committed from now on.
    pub fn subscribe(&self) -> Receiver<Transition> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.observers.lock().push(tx);
        rx
    }

    /// Move to `target` if the table allows it.
    ///
    /// A rejected request is logged and leaves the state untouched.
    #[instrument(name = "nav_transition", skip_all, fields(target = target.name()))]
    pub fn request_transition(&self, target: NavState) -> NavigationResult<Transition> {
        // Observers are notified under the write lock so commit order and
        // delivery order agree.
        let mut state = self.state.write();
        let from = state.kind();
        let to = target.kind();

        if !from.can_transition_to(to) {
            warn!(from = from.name(), to = to.name(), "Illegal state transition");
            return Err(NavigationError::IllegalTransition {
                from: from.name(),
                to: to.name(),
            });
        }

        let previous = std::mem::replace(&mut *state, target);
        let transition = Transition {
            previous,
            current: state.clone(),
        };
        debug!(from = from.name(), to = to.name(), "State transition");

        self.observers
            .lock()
            .retain(|observer| observer.send(transition.clone()).is_ok());

        Ok(transition)
    }

    /// Return the current state if its kind is in `allowed`.
    ///
    /// Callers use this to guard an operation; outside the set the
    /// operation must not run.
    pub fn state_in(&self, allowed: &[NavStateKind]) -> NavigationResult<NavState> {
        let state = self.state.read();
        if allowed.contains(&state.kind()) {
            Ok(state.clone())
        } else {
            debug!(current = state.name(), ?allowed, "Guarded operation skipped");
            Err(NavigationError::IllegalState {
                current: state.name(),
            })
        }
    }
}

impl Default for StateNavigator {
    fn default() -> Self {
        Self::new()
    }
}
