//! Headless frontend: drains the status channel while tracing carries the
//! log output.
//!
//! Every operator log line sent as [`StatusEvent::Log`] is also recorded
//! through `tracing` where it originates, so log events are not re-emitted
//! here. Controller state changes are the only events worth a line.

use tokio::sync::{mpsc, watch};
use tracing::{info, trace};

use cellguard_core::{ControllerState, StatusEvent};

/// Drain the status channel until it closes or `shutdown` flips.
pub async fn run_headless(
    mut events: mpsc::Receiver<StatusEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last_state = None;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if let Some(state) = state_change(&mut last_state, &event) {
                        info!(target: "cellguard::device", %state, "controller state changed");
                    } else {
                        trace!(event = ?event, "status event");
                    }
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }
}

/// The new controller state, if `event` changes it.
fn state_change(
    last: &mut Option<ControllerState>,
    event: &StatusEvent,
) -> Option<ControllerState> {
    match event {
        StatusEvent::State(state) if *last != Some(*state) => {
            *last = Some(*state);
            Some(*state)
        }
        _ => None,
    }
}
