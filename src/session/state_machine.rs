//! `idfcom` session state machine.
//!
//! A session runs the actions of a [`Plan`] in order and stops at the first
//! failure:
//!
//! ```text
//!                  START
//!                    |
//!                    v
//!                .-------.   empty plan
//!                | Init  |--------------.
//!                '-------'              |
//!                    |                  |
//!                    v                  |
//!             .-------------.           |
//!        .--->|  RunAction  |---.       |
//!        |    '-------------'   |       |
//!        '-----' next action    |       |
//!                        last action    |
//!                         or error      |
//!                               v       v
//!                             .----------.
//!                             |   Done   |
//!                             '----------'
//!                                  |
//!                                  v
//!                                 END
//! ```

use super::events::*;
use super::states::*;
use crate::{Error, Executor, Plan, Settings};

// =============================================================================
// Public Interface
// =============================================================================

/// Represents the `idfcom` session state machine. Use the `factory()`
/// function to get an instance then run it by calling its `run()` method.
pub struct Session {
    sm: SessionStates,
    executor: Executor,
}
impl Session {
    /// The session event loop runs until the `Done` state is reached and its
    /// `should_exit` flag is set. At such point, the event loop terminates and
    /// returns the error of the action that failed, if any.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            self.sm = self.sm.step(&mut self.executor);
            if let SessionStates::Done(sm) = &mut self.sm {
                if sm.state.should_exit {
                    return match sm.state.error.take() {
                        Some(e) => Err(e),
                        None => Ok(()),
                    };
                }
            }
        }
    }
}

/// Factory function for the `idfcom` session state machine. Use it to get an
/// instance of the state machine, which you can run by invoking its `run()`
/// method.
pub fn factory(settings: Settings, plan: Plan, executor: Executor) -> Session {
    Session {
        // The state machine naturally starts in the `Init` state.
        sm: SessionStates::Init(SessionSM::new(settings, plan)),
        executor,
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// The raw state machine running a session.
///
/// The settings are shared by all states; the state holds the data specific
/// to it.
#[derive(Debug)]
struct SessionSM<S: Runnable> {
    settings: Settings,
    state: S,
}
impl<S: Runnable> SessionSM<S> {
    fn run(&mut self, executor: &mut Executor) -> Event {
        self.state.run(&self.settings, executor)
    }
}

/// The state machine starts in the `InitState`.
impl SessionSM<InitState> {
    fn new(settings: Settings, plan: Plan) -> Self {
        SessionSM {
            settings,
            state: InitState { plan },
        }
    }
}

/// An enum wrapper around the states of the session state machine.
enum SessionStates {
    Init(SessionSM<InitState>),
    RunAction(SessionSM<RunActionState>),
    Done(SessionSM<DoneState>),
}
impl SessionStates {
    /// The unit of work in the state machine event loop. It runs the current
    /// state and decides the next transition from the event it returns.
    fn step(&mut self, executor: &mut Executor) -> Self {
        match self {
            SessionStates::Init(sm) => {
                let event = sm.run(executor);
                match event {
                    Event::RunAction(ev) => SessionStates::RunAction(ev.into()),
                    Event::Done(ev) => SessionStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::RunAction(sm) => {
                let event = sm.run(executor);
                match event {
                    Event::RunAction(ev) => SessionStates::RunAction(ev.into()),
                    Event::Done(ev) => SessionStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            SessionStates::Done(sm) => {
                let event = sm.run(executor);
                match event {
                    Event::Exit(ev) => SessionStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<RunActionEvent> for SessionSM<RunActionState> {
    fn from(event: RunActionEvent) -> SessionSM<RunActionState> {
        SessionSM {
            settings: event.settings,
            state: RunActionState {
                plan: event.plan,
                index: event.index,
            },
        }
    }
}

impl From<DoneEvent> for SessionSM<DoneState> {
    fn from(event: DoneEvent) -> SessionSM<DoneState> {
        SessionSM {
            settings: event.settings,
            state: DoneState {
                error: event.error,
                skipped: event.skipped,
                should_exit: false,
            },
        }
    }
}
impl From<ExitEvent> for SessionSM<DoneState> {
    fn from(event: ExitEvent) -> SessionSM<DoneState> {
        SessionSM {
            settings: event.settings,
            state: DoneState {
                error: event.error,
                skipped: false,
                should_exit: true,
            },
        }
    }
}
