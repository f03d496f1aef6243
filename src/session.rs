//! Execution of a scheduled [`Plan`](crate::Plan), one action at a time.
//!
//! **Example** - Running the session event loop:
//! ```no_run
//! use idfcom::{self as idf, Action, EnvironmentSnapshot, Executor, Plan};
//!
//! let settings = idf::SettingsBuilder::new().finalize();
//! let plan = Plan::schedule(&[Action::Flash, Action::Monitor]);
//! let executor = Executor::system(EnvironmentSnapshot::capture());
//! let mut session = idf::session::factory(settings, plan, executor);
//! if let Err(e) = session.run() {
//!     eprintln!("{}", e);
//! }
//! ```

mod events;
mod state_machine;
mod states;

pub use state_machine::{factory, Session};
