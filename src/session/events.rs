//! Events for the `idfcom` session state machine.
//!
//! This modules is private and restricted to the [`session`](crate::session)
//! scope. The public interface of the state machine is provided by
//! [`session`](crate::session).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::{Error, Plan, Settings};

// =============================================================================
// Crate-Public Interface
// =============================================================================

// RunActionEvent ==============================================================

/// Event fired to trigger a transition to the `RunAction` state.
///
/// This event can happen under one of the following circumstances:
///
///  1. While at the `Init` state, when the plan has at least one action.
///  2. While at the `RunAction` state, after an action completed successfully
///     and more actions remain.
#[derive(Debug)]
pub(crate) struct RunActionEvent {
    pub settings: Settings,
    pub plan: Plan,
    /// Position in the plan of the action to run next.
    pub index: usize,
}

// DoneEvent ===================================================================

/// Event fired when the session completes and is about to terminate. It
/// triggers a transition to the `Done` state.
///
/// This event can happen after the last action completed, when there was
/// nothing to do, or as soon as an action fails. Remaining actions are not
/// run after a failure.
#[derive(Debug)]
pub(crate) struct DoneEvent {
    pub settings: Settings,
    /// The failure that ended the session, if any.
    pub error: Option<Error>,
    /// Whether actions after the failed one were left unexecuted.
    pub skipped: bool,
}

// ExitEvent ===================================================================

/// The last event of the session state machine. It terminates the event loop
/// and hands the outcome back to the caller of
/// [`Session::run`](super::Session::run).
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub settings: Settings,
    pub error: Option<Error>,
}

// Events enum =================================================================

/// Events that can be triggered within the session state machine.
#[derive(Debug)]
pub(crate) enum Event {
    RunAction(RunActionEvent),
    Done(DoneEvent),
    Exit(ExitEvent),
}
