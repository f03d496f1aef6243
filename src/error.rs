//! Library and application errors.

use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// All possible errors returned by `idfcom`.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("No serial ports found")]
    #[diagnostic(
        code(idfcom::no_device_found),
        help("Connect a device, or use '-p PORT' option to set a specific port.")
    )]
    NoDeviceFound,

    #[error("Failed to enumerate serial ports")]
    #[diagnostic(
        code(idfcom::port_enumeration),
        help("Check the permissions on the serial devices, or use '-p PORT' option to set a specific port.")
    )]
    PortEnumeration(#[source] serialport::Error),

    #[error("Expected build output '{}' was not found", .path.display())]
    #[diagnostic(code(idfcom::missing_artifact))]
    MissingArtifact {
        path: PathBuf,
        #[help]
        hint: String,
    },

    #[error("Environment variable {0} is not set")]
    #[diagnostic(
        code(idfcom::missing_environment),
        help("Set up the ESP-IDF environment first, e.g. by sourcing `export.sh` from the ESP-IDF directory.")
    )]
    MissingEnvironment(&'static str),

    #[error("Invalid baud rate `{value}` taken from {origin}")]
    #[diagnostic(
        code(idfcom::invalid_baud),
        help("Baud rates must be positive integers such as 115200.")
    )]
    InvalidBaud { origin: String, value: String },

    #[error("Action `{action}` depends on undeclared action `{predecessor}`")]
    #[diagnostic(code(idfcom::dangling_reference))]
    DanglingReference { action: String, predecessor: String },

    #[error("Cycle in action dependencies: {}", .0.join(" -> "))]
    #[diagnostic(code(idfcom::cycle))]
    Cycle(Vec<String>),

    #[error("Action `{0}` is declared more than once")]
    #[diagnostic(code(idfcom::duplicate_action))]
    DuplicateAction(String),

    #[error("Unknown action `{0}`")]
    #[diagnostic(code(idfcom::unknown_action))]
    UnknownAction(String),

    #[error("{tool} failed with exit code {}", .code.map_or_else(|| "<signal>".to_string(), |c| c.to_string()))]
    #[diagnostic(code(idfcom::subprocess_failure))]
    SubprocessFailure { tool: String, code: Option<i32> },

    #[error("Failed to start {tool}")]
    #[diagnostic(
        code(idfcom::spawn),
        help("Ensure the tool and its interpreter are installed and on the PATH.")
    )]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse '{}'", .path.display())]
    #[diagnostic(code(idfcom::json))]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(idfcom::io))]
    Io(#[from] io::Error),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn cycle_message_lists_path() {
    let err = Error::Cycle(vec!["a".into(), "b".into(), "a".into()]);
    assert_eq!(err.to_string(), "Cycle in action dependencies: a -> b -> a");
}

#[test]
fn subprocess_failure_message() {
    let err = Error::SubprocessFailure {
        tool: "esptool.py".into(),
        code: Some(2),
    };
    assert_eq!(err.to_string(), "esptool.py failed with exit code 2");

    let err = Error::SubprocessFailure {
        tool: "idf_monitor".into(),
        code: None,
    };
    assert_eq!(err.to_string(), "idf_monitor failed with exit code <signal>");
}
