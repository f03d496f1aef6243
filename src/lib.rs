//! `idfcom` flashes ESP-IDF projects to a microcontroller over a serial
//! connection and monitors its console output.
//!
//! The actual work is done by the tools shipped with ESP-IDF: the build system
//! flash targets, `esptool.py` and `idf_monitor.py`. What `idfcom` adds is the
//! layer in front of them:
//!
//! * **Serial settings resolution.** The serial port and baud rates come from
//!   the command line, then from the environment (`ESPPORT`, `ESPBAUD`,
//!   `IDF_MONITOR_BAUD`, `MONITORBAUD`), then from the build output. When no
//!   port is given, the connected devices are enumerated and the one whose
//!   name sorts last is chosen, the same choice `esptool.py` makes on its own.
//! * **Action ordering.** Actions such as `erase_flash`, `flash` and `monitor`
//!   can be requested together in any order. Each action declares the actions
//!   it must follow (see [`Action::predecessors`]), and a [`Plan`] puts the
//!   requested ones in a valid order, e.g. erasing before flashing and
//!   flashing before monitoring. When an encrypted flash action is part of
//!   the plan, the monitor runs in encrypted mode as well.
//! * **Execution.** A [`session`] runs the plan one action at a time and stops
//!   at the first failure.
//!
//! All environment access goes through an [`EnvironmentSnapshot`] captured
//! once at startup, which keeps resolution deterministic and testable.

mod actions;
mod environment;
mod error;
mod executor;
mod project;
mod resolver;
mod settings;
mod utils;

pub mod session;
pub mod tools;

pub use actions::{Action, ActionKind, ActionOption, ActionSpec, ActionTable, FlashEncryption, Plan};
pub use environment::{
    EnvironmentSnapshot, ESPBAUD, ESPPORT, IDF_MONITOR_BAUD, IDF_PATH, MONITORBAUD, MSYSTEM,
};
pub use error::Error;
pub use executor::Executor;
pub use project::{
    sdkconfig_value, ExtraEsptoolArgs, FlasherArgs, ProjectDescription, FLASHER_ARGS,
    PROJECT_DESCRIPTION,
};
pub use resolver::{ResolvedTarget, Resolver, DEFAULT_FLASH_BAUD};
pub use settings::{Settings, SettingsBuilder};
pub use utils::{commandline_options, PortEnumerator, SystemPorts};
