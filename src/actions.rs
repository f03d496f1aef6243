//! Serial actions and their ordering constraints.
//!
//! Every action `idfcom` knows about is a variant of [`Action`], and its
//! predecessors are other variants, so a reference to an undeclared action
//! cannot be written. The string based [`ActionTable`] mirrors the same
//! declarations for tools that work with action names, and is what gets
//! validated for cycles at startup.
//!
//! **Example** - Scheduling a flash followed by the monitor:
//! ```
//! use idfcom::{Action, Plan};
//!
//! let plan = Plan::schedule(&[Action::Monitor, Action::EncryptedFlash]);
//! assert_eq!(plan.actions(), &[Action::EncryptedFlash, Action::Monitor]);
//! assert!(plan.monitor_encrypted());
//! ```

mod kind;
mod plan;
mod table;

pub use kind::{Action, ActionKind, ActionOption};
pub use plan::{FlashEncryption, Plan};
pub use table::{ActionSpec, ActionTable};
