//! Settings given on the command line for one `idfcom` invocation.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::path::PathBuf;

// =============================================================================
// Public Interface
// =============================================================================

/// Groups all the values explicitly given by the user for a run of `idfcom`
/// and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
///
/// Anything left unset here is resolved later from the environment, the
/// connected devices or the build output.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The project directory, where the monitor is started from.
    pub project_dir: PathBuf,
    /// The build directory holding `project_description.json` and
    /// `flasher_args.json`.
    pub build_dir: PathBuf,
    /// The serial port, usually the device path.
    pub port: Option<String>,
    /// The baud rate used for flashing.
    pub baud: Option<u32>,
    /// The baud rate used by the monitor.
    pub monitor_baud: Option<u32>,
    /// Restrict the monitor output to a series of `<tag>:<log_level>` items.
    pub print_filter: Option<String>,
    /// Run the monitor with encrypted flash targets, even when no encrypted
    /// flash action is scheduled.
    pub encrypted: bool,
    /// Python interpreter running the ESP-IDF tools.
    pub python: String,
    /// The command line the monitor uses to re-run `idfcom` (e.g. to flash
    /// again from inside the monitor).
    pub rerun_command: Vec<String>,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```
/// let settings = idfcom::SettingsBuilder::new().port("/dev/ttyUSB0").finalize();
/// assert_eq!(settings.build_dir, std::path::PathBuf::from("build"));
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using the current directory as project
    /// directory and no explicit serial values.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                project_dir: PathBuf::from("."),
                build_dir: PathBuf::from("build"),
                port: None,
                baud: None,
                monitor_baud: None,
                print_filter: None,
                encrypted: false,
                python: "python".into(),
                rerun_command: vec![],
                _private_use_builder: (),
            },
        }
    }

    /// Set the project directory. The build directory follows it unless set
    /// explicitly afterwards.
    pub fn project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.settings.project_dir = project_dir.into();
        self.settings.build_dir = self.settings.project_dir.join("build");
        self
    }

    /// Set the build directory
    pub fn build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.settings.build_dir = build_dir.into();
        self
    }

    /// Set the path to the serial port
    pub fn port<'a>(mut self, port: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.port = Some(port.into().as_ref().to_owned());
        self
    }

    /// Set the flashing baud rate in symbols-per-second
    pub fn baud(mut self, baud: u32) -> Self {
        self.settings.baud = Some(baud);
        self
    }

    /// Set the monitor baud rate in symbols-per-second
    pub fn monitor_baud(mut self, monitor_baud: u32) -> Self {
        self.settings.monitor_baud = Some(monitor_baud);
        self
    }

    pub fn print_filter<'a>(mut self, filter: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.print_filter = Some(filter.into().as_ref().to_owned());
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.settings.encrypted = encrypted;
        self
    }

    /// Set the python interpreter used to run `esptool.py` and
    /// `idf_monitor.py`
    pub fn python<'a>(mut self, python: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.python = python.into().as_ref().to_owned();
        self
    }

    pub fn rerun_command(mut self, command: Vec<String>) -> Self {
        self.settings.rerun_command = command;
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            project_dir: PathBuf::from("."),
            build_dir: PathBuf::from("build"),
            port: None,
            baud: None,
            monitor_baud: None,
            print_filter: None,
            encrypted: false,
            python: "python".into(),
            rerun_command: vec![],
            _private_use_builder: (),
        }
    )
}

#[test]
fn port() {
    let settings = SettingsBuilder::new().port("/dev/ttyUSB0").finalize();
    assert_eq!(settings.port.unwrap(), "/dev/ttyUSB0");
}

#[test]
fn baud_rates() {
    let settings = SettingsBuilder::new()
        .baud(921_600)
        .monitor_baud(74_880)
        .finalize();
    assert_eq!(settings.baud, Some(921_600));
    assert_eq!(settings.monitor_baud, Some(74_880));
}

#[test]
fn build_dir_follows_project_dir() {
    let settings = SettingsBuilder::new().project_dir("/work/blink").finalize();
    assert_eq!(settings.build_dir, PathBuf::from("/work/blink/build"));

    let settings = SettingsBuilder::new()
        .project_dir("/work/blink")
        .build_dir("/tmp/out")
        .finalize();
    assert_eq!(settings.project_dir, PathBuf::from("/work/blink"));
    assert_eq!(settings.build_dir, PathBuf::from("/tmp/out"));
}

#[test]
fn monitor_options() {
    let settings = SettingsBuilder::new()
        .print_filter("wifi:W")
        .encrypted(true)
        .finalize();
    assert_eq!(settings.print_filter.unwrap(), "wifi:W");
    assert!(settings.encrypted);
}
