//! Read-only snapshot of the process environment.
//!
//! The snapshot is captured once per invocation and handed to whoever needs
//! environment values, so nothing below the command line reads the process
//! environment directly.

use std::{collections::BTreeMap, iter::FromIterator, path::PathBuf};

use crate::Error;

/// Serial port used when `-p/--port` is not given.
pub const ESPPORT: &str = "ESPPORT";
/// Flash baud rate used when `-b/--baud` is not given.
pub const ESPBAUD: &str = "ESPBAUD";
/// First monitor baud rate override.
pub const IDF_MONITOR_BAUD: &str = "IDF_MONITOR_BAUD";
/// Second monitor baud rate override.
pub const MONITORBAUD: &str = "MONITORBAUD";
/// Root of the ESP-IDF installation, used to locate the external tools.
pub const IDF_PATH: &str = "IDF_PATH";
/// Set by MSYS2 shells, which need the monitor to run under `winpty`.
pub const MSYSTEM: &str = "MSYSTEM";

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct EnvironmentSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvironmentSnapshot {
    /// Capture the current process environment. Values that are not valid
    /// unicode are converted lossily.
    pub fn capture() -> Self {
        std::env::vars_os()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get), but treats a variable set to an empty string
    /// as absent.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// The ESP-IDF installation root.
    pub fn idf_path(&self) -> Result<PathBuf, Error> {
        self.non_empty(IDF_PATH)
            .map(PathBuf::from)
            .ok_or(Error::MissingEnvironment(IDF_PATH))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        EnvironmentSnapshot {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn empty_values_are_absent() {
    let env: EnvironmentSnapshot = vec![(MONITORBAUD, ""), (ESPPORT, "/dev/ttyUSB0")]
        .into_iter()
        .collect();
    assert!(env.contains(MONITORBAUD));
    assert_eq!(env.get(MONITORBAUD), Some(""));
    assert_eq!(env.non_empty(MONITORBAUD), None);
    assert_eq!(env.non_empty(ESPPORT), Some("/dev/ttyUSB0"));
}

#[test]
fn idf_path_required() {
    let env = EnvironmentSnapshot::default();
    assert!(matches!(
        env.idf_path(),
        Err(Error::MissingEnvironment(IDF_PATH))
    ));

    let env: EnvironmentSnapshot = vec![(IDF_PATH, "/opt/esp-idf")].into_iter().collect();
    assert_eq!(env.idf_path().unwrap(), PathBuf::from("/opt/esp-idf"));
}
