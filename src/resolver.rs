//! Resolution of the serial port and baud rates for an action.
//!
//! Values are layered: whatever the user gave explicitly wins, then the
//! environment, then the build output or a built-in default. The serial port
//! falls back to the connected devices: their names are sorted in reverse
//! order and the first one is picked, the same search order `esptool.py` uses,
//! so that flashing and monitoring in one invocation agree on the port.

use std::io::Write;

use console::style;
use log::{info, warn};

use crate::{
    environment::{EnvironmentSnapshot, ESPBAUD, ESPPORT, IDF_MONITOR_BAUD, MONITORBAUD},
    project::ProjectDescription,
    utils::PortEnumerator,
    Error,
};

/// Baud rate used for flashing when neither `-b` nor `ESPBAUD` is given.
pub const DEFAULT_FLASH_BAUD: u32 = 460_800;

/// The serial settings an action runs with.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResolvedTarget {
    pub port: String,
    pub baud: u32,
}

/// Resolves serial settings against one environment snapshot and one view of
/// the connected devices.
///
/// A port picked automatically is remembered, so the notice announcing it is
/// written once per invocation and every action uses the same device.
pub struct Resolver<P, W> {
    env: EnvironmentSnapshot,
    ports: P,
    out: W,
    selected: Option<String>,
}

impl<P: PortEnumerator, W: Write> Resolver<P, W> {
    /// Notices about automatically selected ports are written to `out`.
    pub fn new(env: EnvironmentSnapshot, ports: P, out: W) -> Self {
        Resolver {
            env,
            ports,
            out,
            selected: None,
        }
    }

    pub fn env(&self) -> &EnvironmentSnapshot {
        &self.env
    }

    /// Where notices are written.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Resolve the port and the monitor baud rate.
    pub fn resolve(
        &mut self,
        explicit_port: Option<&str>,
        explicit_baud: Option<u32>,
        description: &ProjectDescription,
    ) -> Result<ResolvedTarget, Error> {
        let port = self.resolve_port(explicit_port)?;
        let baud = self.monitor_baud(explicit_baud, description)?;
        Ok(ResolvedTarget { port, baud })
    }

    /// Resolve the port and the flashing baud rate.
    pub fn resolve_flash(
        &mut self,
        explicit_port: Option<&str>,
        explicit_baud: Option<u32>,
    ) -> Result<ResolvedTarget, Error> {
        let port = self.resolve_port(explicit_port)?;
        let baud = self.flash_baud(explicit_baud)?;
        Ok(ResolvedTarget { port, baud })
    }

    /// The explicit port (or `ESPPORT`), otherwise the connected device whose
    /// name sorts last.
    pub fn resolve_port(&mut self, explicit: Option<&str>) -> Result<String, Error> {
        let explicit = explicit
            .filter(|port| !port.is_empty())
            .or_else(|| self.env.non_empty(ESPPORT));
        if let Some(port) = explicit {
            return Ok(port.to_string());
        }

        if let Some(port) = &self.selected {
            return Ok(port.clone());
        }

        let mut ports = self.ports.ports()?;
        ports.sort_by(|a, b| b.cmp(a));
        let port = ports.into_iter().next().ok_or(Error::NoDeviceFound)?;

        info!("Auto-selected serial port {}", port);
        if let Err(e) = writeln!(
            self.out,
            "Choosing default port {} (use '-p PORT' option to set a specific serial port)",
            style(&port).cyan()
        ) {
            warn!("could not write port notice: {}", e);
        }

        self.selected = Some(port.clone());
        Ok(port)
    }

    /// `-b`, then `ESPBAUD`, then [`DEFAULT_FLASH_BAUD`].
    pub fn flash_baud(&self, explicit: Option<u32>) -> Result<u32, Error> {
        if let Some(baud) = explicit {
            return Ok(baud);
        }
        match self.env.non_empty(ESPBAUD) {
            Some(value) => parse_baud(ESPBAUD, value),
            None => Ok(DEFAULT_FLASH_BAUD),
        }
    }

    /// `-B`, then `IDF_MONITOR_BAUD`, then `MONITORBAUD`, then the baud rate
    /// the project was configured with.
    pub fn monitor_baud(
        &self,
        explicit: Option<u32>,
        description: &ProjectDescription,
    ) -> Result<u32, Error> {
        if let Some(baud) = explicit {
            return Ok(baud);
        }
        for name in [IDF_MONITOR_BAUD, MONITORBAUD].iter() {
            if let Some(value) = self.env.non_empty(name) {
                return parse_baud(name, value);
            }
        }
        Ok(description.monitor_baud)
    }
}

fn parse_baud(origin: &str, value: &str) -> Result<u32, Error> {
    match value.trim().parse::<u32>() {
        Ok(baud) if baud > 0 => Ok(baud),
        _ => Err(Error::InvalidBaud {
            origin: origin.to_string(),
            value: value.to_string(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
fn description(monitor_baud: u32) -> ProjectDescription {
    ProjectDescription {
        app_elf: "app.elf".into(),
        monitor_baud,
        monitor_toolprefix: "xtensa-esp32-elf-".into(),
        config_file: "sdkconfig".into(),
    }
}

#[cfg(test)]
fn resolver(env: &[(&str, &str)], ports: &[&str]) -> Resolver<Vec<String>, Vec<u8>> {
    Resolver::new(
        env.iter().copied().collect(),
        ports.iter().map(|p| p.to_string()).collect(),
        Vec::new(),
    )
}

#[cfg(test)]
fn notices(resolver: &Resolver<Vec<String>, Vec<u8>>) -> usize {
    String::from_utf8_lossy(resolver.output())
        .matches("Choosing default port")
        .count()
}

#[test]
fn explicit_port_and_description_baud() {
    let mut r = resolver(&[], &["ttyUSB0"]);
    let target = r.resolve(Some("COM5"), None, &description(115_200)).unwrap();
    assert_eq!(
        target,
        ResolvedTarget {
            port: "COM5".into(),
            baud: 115_200
        }
    );
    assert_eq!(notices(&r), 0);
}

#[test]
fn auto_selects_last_port_once() {
    let mut r = resolver(&[], &["ttyUSB0", "ttyUSB1"]);
    assert_eq!(r.resolve_port(None).unwrap(), "ttyUSB1");
    assert_eq!(notices(&r), 1);

    // Later actions of the same invocation reuse the selection silently.
    let target = r.resolve(None, None, &description(115_200)).unwrap();
    assert_eq!(target.port, "ttyUSB1");
    assert_eq!(notices(&r), 1);
}

#[test]
fn auto_selection_is_reverse_lexicographic() {
    let devices = [
        "/dev/ttyACM0",
        "/dev/ttyUSB10",
        "/dev/ttyUSB9",
        "/dev/cu.usbserial-1420",
    ];
    let mut r = resolver(&[], &devices);
    let expected = devices.iter().max().unwrap().to_string();
    assert_eq!(r.resolve_port(None).unwrap(), expected);
    // Plain string order: "ttyUSB9" sorts after "ttyUSB10".
    assert_eq!(expected, "/dev/ttyUSB9");
}

#[test]
fn no_devices() {
    let mut r = resolver(&[], &[]);
    assert!(matches!(r.resolve_port(None), Err(Error::NoDeviceFound)));
    assert_eq!(notices(&r), 0);
}

#[test]
fn espport_counts_as_explicit() {
    let mut r = resolver(&[(ESPPORT, "/dev/ttyS3")], &["/dev/ttyUSB0"]);
    assert_eq!(r.resolve_port(None).unwrap(), "/dev/ttyS3");
    assert_eq!(r.resolve_port(Some("COM7")).unwrap(), "COM7");
    assert_eq!(notices(&r), 0);

    let mut r = resolver(&[(ESPPORT, "")], &["/dev/ttyUSB0"]);
    assert_eq!(r.resolve_port(None).unwrap(), "/dev/ttyUSB0");
}

#[test]
fn monitor_baud_precedence() {
    const EXPLICIT: u32 = 1;
    const IDF: u32 = 2;
    const MONITOR: u32 = 3;
    const DESC: u32 = 4;

    // Every presence combination of the optional sources. `monitor_baud` is a
    // required field of the project description (see
    // `project::description_requires_monitor_baud`), so the chain always ends
    // with a value.
    for mask in 0..8u8 {
        let explicit = if mask & 1 != 0 { Some(EXPLICIT) } else { None };
        let idf = if mask & 2 != 0 { IDF.to_string() } else { String::new() };
        let monitor = if mask & 4 != 0 { MONITOR.to_string() } else { String::new() };

        let env = [(IDF_MONITOR_BAUD, idf.as_str()), (MONITORBAUD, monitor.as_str())];
        let r = resolver(&env, &[]);

        let expected = match (explicit, idf.is_empty(), monitor.is_empty()) {
            (Some(baud), _, _) => baud,
            (None, false, _) => IDF,
            (None, true, false) => MONITOR,
            (None, true, true) => DESC,
        };
        assert_eq!(
            r.monitor_baud(explicit, &description(DESC)).unwrap(),
            expected,
            "combination {:03b}",
            mask
        );
    }

    // Unset and empty variables are both skipped.
    let r = resolver(&[], &[]);
    assert_eq!(r.monitor_baud(None, &description(DESC)).unwrap(), DESC);
}

#[test]
fn monitor_baud_from_environment() {
    let r = resolver(&[(MONITORBAUD, "74880")], &[]);
    assert_eq!(r.monitor_baud(None, &description(115_200)).unwrap(), 74_880);

    let r = resolver(&[(IDF_MONITOR_BAUD, "921600"), (MONITORBAUD, "74880")], &[]);
    assert_eq!(r.monitor_baud(None, &description(115_200)).unwrap(), 921_600);
}

#[test]
fn invalid_environment_baud() {
    let r = resolver(&[(IDF_MONITOR_BAUD, "fast")], &[]);
    match r.monitor_baud(None, &description(115_200)) {
        Err(Error::InvalidBaud { origin, value }) => {
            assert_eq!(origin, IDF_MONITOR_BAUD);
            assert_eq!(value, "fast");
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn flash_baud_precedence() {
    let r = resolver(&[], &[]);
    assert_eq!(r.flash_baud(None).unwrap(), DEFAULT_FLASH_BAUD);
    assert_eq!(r.flash_baud(Some(115_200)).unwrap(), 115_200);

    let r = resolver(&[(ESPBAUD, "921600")], &[]);
    assert_eq!(r.flash_baud(None).unwrap(), 921_600);
    assert_eq!(r.flash_baud(Some(115_200)).unwrap(), 115_200);

    let r = resolver(&[(ESPBAUD, "0")], &[]);
    assert!(matches!(r.flash_baud(None), Err(Error::InvalidBaud { .. })));
}

#[test]
fn resolve_flash_target() {
    let mut r = resolver(&[(ESPBAUD, "115200")], &["COM3", "COM4"]);
    assert_eq!(
        r.resolve_flash(None, None).unwrap(),
        ResolvedTarget {
            port: "COM4".into(),
            baud: 115_200
        }
    );
}

#[cfg(test)]
struct UnreadablePorts;

#[cfg(test)]
impl PortEnumerator for UnreadablePorts {
    fn ports(&self) -> Result<Vec<String>, Error> {
        Err(Error::PortEnumeration(serialport::Error::new(
            serialport::ErrorKind::Unknown,
            "permission denied",
        )))
    }
}

#[test]
fn enumeration_failure_is_reported() {
    let mut r = Resolver::new(EnvironmentSnapshot::default(), UnreadablePorts, Vec::new());
    match r.resolve_port(None) {
        Err(Error::PortEnumeration(e)) => assert_eq!(e.description, "permission denied"),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(r.output().is_empty());

    // An explicit port needs no enumeration.
    assert_eq!(r.resolve_port(Some("COM5")).unwrap(), "COM5");
}
