//! Command lines of the external tools and how they are run.
//!
//! Building a [`ToolCommand`] is pure, so the exact arguments handed to
//! `esptool.py`, `idf_monitor.py` and the build system can be checked without
//! running anything. A [`ToolRunner`] then executes it and waits for it.

use std::{
    fmt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::{debug, info};

use crate::{
    environment::{ESPBAUD, ESPPORT},
    project::{FlasherArgs, ProjectDescription},
    resolver::ResolvedTarget,
    Action, Error,
};

/// Name of the flashing tool, as shown in messages.
pub const ESPTOOL: &str = "esptool.py";
/// Name of the monitor, as shown in messages.
pub const IDF_MONITOR: &str = "idf_monitor";

/// A program invocation: program, arguments, working directory and extra
/// environment variables.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        ToolCommand {
            program: program.into(),
            args: vec![],
            cwd: cwd.into(),
            env: vec![],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Run the whole command line through another program, e.g. `winpty`.
    pub fn wrapped_in(self, wrapper: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        ToolCommand {
            program: wrapper.to_string(),
            args,
            cwd: self.cwd,
            env: self.env,
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.env {
            write!(f, "{}={} ", name, value)?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// `esptool.py` with the connection arguments the build system recorded.
/// The operation (e.g. `erase_flash`) is appended by the caller.
pub fn esptool_command(
    python: &str,
    idf_path: &Path,
    build_dir: &Path,
    target: &ResolvedTarget,
    flasher_args: &FlasherArgs,
) -> ToolCommand {
    let esptool = idf_path
        .join("components")
        .join("esptool_py")
        .join("esptool")
        .join("esptool.py");
    let extra = &flasher_args.extra_esptool_args;

    let command = ToolCommand::new(python, build_dir)
        .arg(esptool.to_string_lossy())
        .args(vec!["-p", target.port.as_str()])
        .args(vec!["-b".to_string(), target.baud.to_string()])
        .args(vec!["--before", extra.before.as_str()])
        .args(vec!["--after", extra.after.as_str()])
        .args(vec!["--chip", extra.chip.as_str()]);

    if extra.stub {
        command
    } else {
        command.arg("--no-stub")
    }
}

/// Everything `idf_monitor.py` needs besides the serial settings.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct MonitorOptions {
    /// Value of `CONFIG_ESP32_CORE_DUMP_DECODE`, when configured.
    pub decode_coredumps: Option<String>,
    pub print_filter: Option<String>,
    pub encrypted: bool,
    /// Command line to run `idfcom` again from within the monitor.
    pub rerun_command: Vec<String>,
    /// Run under `winpty` (MSYS2 shells).
    pub winpty: bool,
}

/// `idf_monitor.py` watching the application built in `build_dir`.
pub fn monitor_command(
    python: &str,
    idf_path: &Path,
    project_dir: &Path,
    build_dir: &Path,
    target: &ResolvedTarget,
    description: &ProjectDescription,
    options: &MonitorOptions,
) -> ToolCommand {
    let monitor = idf_path.join("tools").join("idf_monitor.py");
    let elf = description.elf_path(build_dir);

    let mut command = ToolCommand::new(python, project_dir)
        .arg(monitor.to_string_lossy())
        .args(vec!["-p", target.port.as_str()])
        .args(vec!["-b".to_string(), target.baud.to_string()])
        .args(vec!["--toolchain-prefix", description.monitor_toolprefix.as_str()]);

    if let Some(decode) = &options.decode_coredumps {
        command = command.args(vec!["--decode-coredumps", decode.as_str()]);
    }
    if let Some(filter) = &options.print_filter {
        command = command.args(vec!["--print_filter", filter.as_str()]);
    }
    command = command.arg(elf.to_string_lossy());
    if options.encrypted {
        command = command.arg("--encrypted");
    }

    let rerun = options
        .rerun_command
        .iter()
        .map(|a| format!("'{}'", a))
        .collect::<Vec<_>>()
        .join(" ");
    command = command.args(vec!["-m".to_string(), rerun]);

    if options.winpty {
        command.wrapped_in("winpty")
    } else {
        command
    }
}

/// The build system target for `action`. Flash targets get the resolved
/// serial settings through `ESPPORT` and `ESPBAUD`.
pub fn target_command(
    build_dir: &Path,
    action: Action,
    serial: Option<&ResolvedTarget>,
) -> ToolCommand {
    let command = ToolCommand::new("cmake", build_dir).args(vec![
        "--build".to_string(),
        build_dir.to_string_lossy().into_owned(),
        "--target".to_string(),
        action.to_string(),
    ]);

    match serial {
        Some(target) => command
            .env(ESPPORT, target.port.as_str())
            .env(ESPBAUD, target.baud.to_string()),
        None => command,
    }
}

/// Executes tool commands, blocking until they finish.
pub trait ToolRunner {
    /// Run `command`; `name` identifies the tool in messages. A non-zero exit
    /// status is an error.
    fn run(&mut self, name: &str, command: &ToolCommand) -> Result<(), Error>;
}

/// Runs tools as child processes sharing this process' terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&mut self, name: &str, command: &ToolCommand) -> Result<(), Error> {
        info!("Running {} in directory {}", name, command.cwd.display());
        debug!("Executing \"{}\"...", command);

        let status = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| Error::Spawn {
                tool: name.to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::SubprocessFailure {
                tool: name.to_string(),
                code: status.code(),
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
use pretty_assertions::assert_eq;

#[cfg(test)]
fn serial() -> ResolvedTarget {
    ResolvedTarget {
        port: "/dev/ttyUSB1".into(),
        baud: 460_800,
    }
}

#[cfg(test)]
fn flasher_args(stub: bool) -> FlasherArgs {
    FlasherArgs {
        extra_esptool_args: crate::project::ExtraEsptoolArgs {
            before: "default_reset".into(),
            after: "hard_reset".into(),
            chip: "esp32".into(),
            stub,
        },
    }
}

#[cfg(test)]
fn description() -> ProjectDescription {
    ProjectDescription {
        app_elf: "blink.elf".into(),
        monitor_baud: 115_200,
        monitor_toolprefix: "xtensa-esp32-elf-".into(),
        config_file: "/work/blink/sdkconfig".into(),
    }
}

#[test]
fn esptool_arguments() {
    let command = esptool_command(
        "python",
        Path::new("/opt/esp-idf"),
        Path::new("/work/blink/build"),
        &serial(),
        &flasher_args(true),
    )
    .arg("erase_flash");

    assert_eq!(command.program, "python");
    assert_eq!(command.cwd, PathBuf::from("/work/blink/build"));
    assert_eq!(
        command.args,
        vec![
            "/opt/esp-idf/components/esptool_py/esptool/esptool.py",
            "-p",
            "/dev/ttyUSB1",
            "-b",
            "460800",
            "--before",
            "default_reset",
            "--after",
            "hard_reset",
            "--chip",
            "esp32",
            "erase_flash",
        ]
    );
}

#[test]
fn esptool_without_stub() {
    let command = esptool_command(
        "python",
        Path::new("/opt/esp-idf"),
        Path::new("build"),
        &serial(),
        &flasher_args(false),
    );
    assert_eq!(command.args.last().map(String::as_str), Some("--no-stub"));
}

#[test]
fn monitor_arguments() {
    let target = ResolvedTarget {
        port: "COM5".into(),
        baud: 115_200,
    };
    let options = MonitorOptions {
        decode_coredumps: Some("info".into()),
        print_filter: Some("wifi:W *:E".into()),
        encrypted: true,
        rerun_command: vec!["idfcom".into(), "-p".into(), "COM5".into()],
        winpty: false,
    };
    let command = monitor_command(
        "python",
        Path::new("/opt/esp-idf"),
        Path::new("/work/blink"),
        Path::new("/work/blink/build"),
        &target,
        &description(),
        &options,
    );

    assert_eq!(command.cwd, PathBuf::from("/work/blink"));
    assert_eq!(
        command.args,
        vec![
            "/opt/esp-idf/tools/idf_monitor.py",
            "-p",
            "COM5",
            "-b",
            "115200",
            "--toolchain-prefix",
            "xtensa-esp32-elf-",
            "--decode-coredumps",
            "info",
            "--print_filter",
            "wifi:W *:E",
            "/work/blink/build/blink.elf",
            "--encrypted",
            "-m",
            "'idfcom' '-p' 'COM5'",
        ]
    );
}

#[test]
fn monitor_under_winpty() {
    let options = MonitorOptions {
        winpty: true,
        ..MonitorOptions::default()
    };
    let command = monitor_command(
        "python",
        Path::new("/opt/esp-idf"),
        Path::new("."),
        Path::new("build"),
        &serial(),
        &description(),
        &options,
    );
    assert_eq!(command.program, "winpty");
    assert_eq!(command.args[0], "python");
    assert!(!command.args.contains(&"--encrypted".to_string()));
    assert!(!command.args.contains(&"--print_filter".to_string()));
}

#[test]
fn flash_target_carries_serial_settings() {
    let command = target_command(Path::new("build"), Action::AppFlash, Some(&serial()));
    assert_eq!(command.program, "cmake");
    assert_eq!(command.args, vec!["--build", "build", "--target", "app-flash"]);
    assert_eq!(
        command.env,
        vec![
            ("ESPPORT".to_string(), "/dev/ttyUSB1".to_string()),
            ("ESPBAUD".to_string(), "460800".to_string()),
        ]
    );
    assert_eq!(
        command.to_string(),
        "ESPPORT=/dev/ttyUSB1 ESPBAUD=460800 cmake --build build --target app-flash"
    );
}

#[test]
fn build_target_has_no_environment() {
    let command = target_command(Path::new("build"), Action::PartitionTable, None);
    assert_eq!(command.args[3], "partition_table");
    assert!(command.env.is_empty());
}

#[cfg(unix)]
#[test]
fn process_runner_reports_exit_code() {
    let mut runner = ProcessRunner;
    let ok = ToolCommand::new("sh", ".").args(vec!["-c", "exit 0"]);
    runner.run("sh", &ok).unwrap();

    let failing = ToolCommand::new("sh", ".").args(vec!["-c", "exit 3"]);
    match runner.run("sh", &failing) {
        Err(Error::SubprocessFailure { tool, code }) => {
            assert_eq!(tool, "sh");
            assert_eq!(code, Some(3));
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn process_runner_missing_program() {
    let mut runner = ProcessRunner;
    let command = ToolCommand::new("idfcom-no-such-program", ".");
    assert!(matches!(
        runner.run("missing", &command),
        Err(Error::Spawn { .. })
    ));
}
