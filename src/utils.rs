//! Helper functions to deal with serial ports and the command line.

mod commandline;
mod ports;

pub use commandline::commandline_options;
pub use ports::{PortEnumerator, SystemPorts};
