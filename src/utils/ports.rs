//! Serial port device enumeration.

use log::debug;
use serialport::available_ports;

use crate::Error;

//==============================================================================
// Public Interface
//==============================================================================

/// Lists the identifiers of the serial devices currently connected.
pub trait PortEnumerator {
    fn ports(&self) -> Result<Vec<String>, Error>;
}

/// Enumerates the serial devices known to the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn ports(&self) -> Result<Vec<String>, Error> {
        enumerate_serial_ports()
    }
}

/// A fixed list of devices.
impl PortEnumerator for Vec<String> {
    fn ports(&self) -> Result<Vec<String>, Error> {
        Ok(self.clone())
    }
}

impl<T: PortEnumerator + ?Sized> PortEnumerator for Box<T> {
    fn ports(&self) -> Result<Vec<String>, Error> {
        (**self).ports()
    }
}

//==============================================================================
// Private stuff
//==============================================================================

/// Enumerates serial devices of every type on the system. USB, PCI and
/// bluetooth ports are all candidates, as are virtual ports for testing.
fn enumerate_serial_ports() -> Result<Vec<String>, Error> {
    let ports = available_ports().map_err(Error::PortEnumeration)?;
    let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
    debug!("Detected serial ports: {:?}", names);
    Ok(names)
}

//==============================================================================
// Unit Tests
//==============================================================================

#[test]
fn fixed_list() {
    let ports = vec!["COM1".to_string(), "COM2".to_string()];
    assert_eq!(ports.ports().unwrap(), vec!["COM1", "COM2"]);

    let boxed: Box<dyn PortEnumerator> = Box::new(ports);
    assert_eq!(boxed.ports().unwrap().len(), 2);
}
