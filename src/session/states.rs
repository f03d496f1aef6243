//! States for the `idfcom` session state machine.
//!
//! This modules is private and restricted to the [`session`](crate::session)
//! scope. The public interface of the state machine is provided by
//! [`session`](crate::session).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use console::style;
use log::info;

use super::events::*;
use crate::{Error, Executor, Plan, Settings};

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state can do any work that needs to be done and
    /// when finished, requests a transition to a `new state` by returning the
    /// appropriate `event`. The `state` and the `event` are consumed to create
    /// the `new state` using the corresponding [`From`] trait implementation
    /// (provided such implementation exists).
    fn run(&mut self, settings: &Settings, executor: &mut Executor) -> Event;
}

// Init State ==================================================================

/// The initial state of the session state machine, holding the plan to run.
///
///  * **[`RunActionEvent`] => [`RunActionState`]** when the plan has at least
///    one action,
///  * **[`DoneEvent`] => [`DoneState`]** when there is nothing to do.
#[derive(Debug)]
pub(crate) struct InitState {
    pub plan: Plan,
}
impl Runnable for InitState {
    fn run(&mut self, settings: &Settings, _executor: &mut Executor) -> Event {
        info!("=> Init");
        let names: Vec<String> = self.plan.actions().iter().map(|a| a.to_string()).collect();
        info!("Executing action(s): {}", names.join(", "));

        if self.plan.is_empty() {
            return Event::Done(DoneEvent {
                settings: settings.clone(),
                error: None,
                skipped: false,
            });
        }

        Event::RunAction(RunActionEvent {
            settings: settings.clone(),
            plan: self.plan.clone(),
            index: 0,
        })
    }
}

// RunAction State =============================================================

/// Runs the action at `index` in the plan and waits for it to finish.
///
///  * **[`RunActionEvent`] => [`RunActionState`]** for the next action after a
///    success,
///  * **[`DoneEvent`] => [`DoneState`]** after the last action, or with the
///    error as soon as an action fails.
#[derive(Debug)]
pub(crate) struct RunActionState {
    pub plan: Plan,
    pub index: usize,
}
impl Runnable for RunActionState {
    fn run(&mut self, settings: &Settings, executor: &mut Executor) -> Event {
        let action = self.plan.actions()[self.index];
        info!("=> Run Action {} ({}/{})", action, self.index + 1, self.plan.len());

        if let Err(e) = executor.execute(action, settings, &self.plan) {
            info!("error: {:?}", e.to_string());
            return Event::Done(DoneEvent {
                settings: settings.clone(),
                error: Some(e),
                skipped: self.index + 1 < self.plan.len(),
            });
        }

        let next = self.index + 1;
        if next < self.plan.len() {
            Event::RunAction(RunActionEvent {
                settings: settings.clone(),
                plan: self.plan.clone(),
                index: next,
            })
        } else {
            Event::Done(DoneEvent {
                settings: settings.clone(),
                error: None,
                skipped: false,
            })
        }
    }
}

// Done State ==================================================================

/// Reached when the session completes its execution and is about to
/// terminate (normally or abnormally).
///
/// This state goes into a 2-phase execution. During the initial phase, it runs
/// like any other state to report the outcome. It then triggers the
/// [`ExitEvent`] to cause the session state machine to terminate and hand the
/// error, if any, back to the caller.
#[derive(Debug)]
pub(crate) struct DoneState {
    /// The failure that ended the session.
    pub error: Option<Error>,
    /// Actions after the failed one were not run.
    pub skipped: bool,
    /// When `true` instructs the session state machine to exit its event loop.
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(&mut self, settings: &Settings, _executor: &mut Executor) -> Event {
        info!(
            "=> Done with{}errors",
            if self.error.is_some() { " " } else { " no " }
        );
        if self.skipped {
            println!("{}", style("Remaining actions were skipped.").red());
        }

        Event::Exit(ExitEvent {
            settings: settings.clone(),
            error: self.error.take(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
fn offline_executor() -> Executor {
    Executor::new(
        crate::EnvironmentSnapshot::default(),
        Box::new(Vec::<String>::new()),
        Box::new(Vec::<u8>::new()),
        Box::new(crate::tools::ProcessRunner),
    )
}

#[test]
fn failing_last_action_skips_nothing() {
    let settings = crate::SettingsBuilder::new().finalize();
    let mut state = RunActionState {
        plan: Plan::schedule(&[crate::Action::Monitor]),
        index: 0,
    };
    match state.run(&settings, &mut offline_executor()) {
        Event::Done(DoneEvent {
            error: Some(Error::NoDeviceFound),
            skipped,
            ..
        }) => assert!(!skipped),
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn failing_action_skips_the_rest() {
    let settings = crate::SettingsBuilder::new()
        .build_dir("/nonexistent/idfcom/build")
        .finalize();
    let mut state = RunActionState {
        plan: Plan::schedule(&[crate::Action::Flash, crate::Action::Monitor]),
        index: 0,
    };
    match state.run(&settings, &mut offline_executor()) {
        Event::Done(DoneEvent {
            error: Some(Error::MissingArtifact { .. }),
            skipped,
            ..
        }) => assert!(skipped),
        other => panic!("unexpected event {:?}", other),
    }
}
