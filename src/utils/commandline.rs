//! Recovering the options of the current invocation.

use std::str::FromStr;

use crate::Action;

/// The command line arguments up to, not including, the first action name.
///
/// The monitor uses them to run `idfcom` again with the same options, e.g. to
/// flash the project without leaving the monitor.
pub fn commandline_options<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter()
        .map(Into::into)
        .take_while(|arg| Action::from_str(arg).is_err())
        .collect()
}

#[test]
fn stops_at_first_action() {
    let args = vec!["idfcom", "-p", "/dev/ttyUSB0", "flash", "monitor"];
    assert_eq!(commandline_options(args), vec!["idfcom", "-p", "/dev/ttyUSB0"]);
}

#[test]
fn keeps_everything_without_actions() {
    let args = vec!["idfcom".to_string(), "-v".to_string()];
    assert_eq!(commandline_options(args.clone()), args);
}
