use std::{
    cell::RefCell,
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
    rc::Rc,
};

use idfcom::{
    self as idf,
    session,
    tools::{ToolCommand, ToolRunner},
    Action, EnvironmentSnapshot, Error, Executor, Plan, Settings, FLASHER_ARGS, IDF_PATH,
    PROJECT_DESCRIPTION,
};
use pretty_assertions::assert_eq;

// =============================================================================
// Helpers
// =============================================================================

type Calls = Rc<RefCell<Vec<(String, ToolCommand)>>>;

/// Records every command instead of running it. Fails the command whose
/// arguments contain `fail_on`.
struct Recorder {
    calls: Calls,
    fail_on: Option<&'static str>,
}

impl ToolRunner for Recorder {
    fn run(&mut self, name: &str, command: &ToolCommand) -> Result<(), Error> {
        self.calls
            .borrow_mut()
            .push((name.to_string(), command.clone()));
        match self.fail_on {
            Some(arg) if command.args.iter().any(|a| a == arg) => Err(Error::SubprocessFailure {
                tool: name.to_string(),
                code: Some(2),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedOutput {
    fn notices(&self) -> usize {
        String::from_utf8_lossy(&self.0.borrow())
            .matches("Choosing default port")
            .count()
    }
}

struct Harness {
    calls: Calls,
    output: SharedOutput,
}

impl Harness {
    fn run(
        settings: Settings,
        actions: &[Action],
        ports: &[&str],
        fail_on: Option<&'static str>,
    ) -> (Self, Result<(), Error>) {
        let harness = Harness {
            calls: Calls::default(),
            output: SharedOutput::default(),
        };
        let env: EnvironmentSnapshot = vec![(IDF_PATH, "/opt/esp-idf")].into_iter().collect();
        let executor = Executor::new(
            env,
            Box::new(ports.iter().map(|p| p.to_string()).collect::<Vec<_>>()),
            Box::new(harness.output.clone()),
            Box::new(Recorder {
                calls: harness.calls.clone(),
                fail_on,
            }),
        );

        let result = session::factory(settings, Plan::schedule(actions), executor).run();
        (harness, result)
    }

    fn names(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(n, _)| n.clone()).collect()
    }

    fn command(&self, index: usize) -> ToolCommand {
        self.calls.borrow()[index].1.clone()
    }
}

/// A project directory with a complete build output.
fn project(name: &str) -> PathBuf {
    project_at(env::temp_dir().join(format!("idfcom-session-{}-{}", name, process::id())))
}

/// Like [`project`], but addressed relative to the current directory.
fn relative_project(name: &str) -> PathBuf {
    project_at(
        Path::new("target")
            .join("idfcom-session")
            .join(format!("{}-{}", name, process::id())),
    )
}

fn project_at(dir: PathBuf) -> PathBuf {
    let _ = fs::remove_dir_all(&dir);
    let build = dir.join("build");
    fs::create_dir_all(&build).unwrap();

    // The build system always records an absolute path.
    let sdkconfig = dir.join("sdkconfig");
    fs::write(&sdkconfig, "CONFIG_ESP32_CORE_DUMP_DECODE=\"uart\"\n").unwrap();
    let sdkconfig = fs::canonicalize(&sdkconfig).unwrap();
    let description = serde_json::json!({
        "app_elf": "hello_world.elf",
        "monitor_baud": "115200",
        "monitor_toolprefix": "xtensa-esp32-elf-",
        "config_file": sdkconfig,
    });
    fs::write(build.join(PROJECT_DESCRIPTION), description.to_string()).unwrap();
    let flasher_args = serde_json::json!({
        "extra_esptool_args": {
            "before": "default_reset",
            "after": "hard_reset",
            "chip": "esp32",
            "stub": true
        }
    });
    fs::write(build.join(FLASHER_ARGS), flasher_args.to_string()).unwrap();
    fs::write(build.join("hello_world.elf"), b"\x7fELF").unwrap();
    dir
}

fn settings(project_dir: &Path) -> idf::SettingsBuilder {
    idf::SettingsBuilder::new()
        .project_dir(project_dir)
        .rerun_command(vec!["idfcom".to_string()])
}

fn has_pair(args: &[String], first: &str, second: &str) -> bool {
    args.windows(2).any(|w| w[0] == first && w[1] == second)
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn erase_flash_and_monitor_run_in_order_on_one_port() {
    let dir = project("order");
    let (h, result) = Harness::run(
        settings(&dir).finalize(),
        &[Action::Monitor, Action::Flash, Action::EraseFlash],
        &["/dev/ttyUSB0", "/dev/ttyUSB1"],
        None,
    );
    result.unwrap();

    assert_eq!(h.names(), vec!["esptool.py", "flash", "idf_monitor"]);
    assert_eq!(h.output.notices(), 1);

    let erase = h.command(0);
    assert!(has_pair(&erase.args, "-p", "/dev/ttyUSB1"));
    assert!(has_pair(&erase.args, "--chip", "esp32"));
    assert_eq!(erase.args.last().map(String::as_str), Some("erase_flash"));

    let flash = h.command(1);
    assert_eq!(flash.program, "cmake");
    assert!(flash
        .env
        .contains(&("ESPPORT".to_string(), "/dev/ttyUSB1".to_string())));
    assert!(flash
        .env
        .contains(&("ESPBAUD".to_string(), "460800".to_string())));

    let monitor = h.command(2);
    assert_eq!(monitor.cwd, dir);
    assert!(has_pair(&monitor.args, "-p", "/dev/ttyUSB1"));
    assert!(has_pair(&monitor.args, "-b", "115200"));
    assert!(has_pair(&monitor.args, "--decode-coredumps", "uart"));
    assert!(has_pair(&monitor.args, "-m", "'idfcom'"));
    assert!(!monitor.args.iter().any(|a| a == "--encrypted"));
}

#[test]
fn encrypted_flash_makes_monitor_encrypted() {
    let dir = project("encrypted");
    let (h, result) = Harness::run(
        settings(&dir).port("COM5").finalize(),
        &[Action::EncryptedFlash, Action::Monitor],
        &[],
        None,
    );
    result.unwrap();

    assert_eq!(h.names(), vec!["encrypted-flash", "idf_monitor"]);
    assert_eq!(h.output.notices(), 0);
    assert!(h.command(0).args.iter().any(|a| a == "encrypted-flash"));
    assert!(h.command(1).args.iter().any(|a| a == "--encrypted"));
}

#[test]
fn explicit_monitor_baud_and_print_filter() {
    let dir = project("filter");
    let (h, result) = Harness::run(
        settings(&dir)
            .monitor_baud(921_600)
            .print_filter("wifi:W")
            .finalize(),
        &[Action::Monitor],
        &["COM3"],
        None,
    );
    result.unwrap();

    let monitor = h.command(0);
    assert!(has_pair(&monitor.args, "-p", "COM3"));
    assert!(has_pair(&monitor.args, "-b", "921600"));
    assert!(has_pair(&monitor.args, "--print_filter", "wifi:W"));
}

#[test]
fn failure_skips_remaining_actions() {
    let dir = project("failure");
    let (h, result) = Harness::run(
        settings(&dir).port("COM5").finalize(),
        &[Action::Flash, Action::Monitor],
        &[],
        Some("flash"),
    );

    match result {
        Err(Error::SubprocessFailure { tool, code }) => {
            assert_eq!(tool, "flash");
            assert_eq!(code, Some(2));
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(h.names(), vec!["flash"]);
}

#[test]
fn no_device_runs_nothing() {
    let dir = project("nodevice");
    let (h, result) = Harness::run(settings(&dir).finalize(), &[Action::Monitor], &[], None);

    assert!(matches!(result, Err(Error::NoDeviceFound)));
    assert!(h.names().is_empty());
}

#[test]
fn missing_build_directory() {
    let dir = project("nobuild");
    fs::remove_dir_all(dir.join("build")).unwrap();
    let (h, result) = Harness::run(
        settings(&dir).port("COM5").finalize(),
        &[Action::Flash],
        &[],
        None,
    );

    match result {
        Err(Error::MissingArtifact { path, .. }) => assert_eq!(path, dir.join("build")),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(h.names().is_empty());
}

#[test]
fn missing_elf_stops_monitor() {
    let dir = project("noelf");
    fs::remove_file(dir.join("build").join("hello_world.elf")).unwrap();
    let (h, result) = Harness::run(
        settings(&dir).port("COM5").finalize(),
        &[Action::Monitor],
        &[],
        None,
    );

    match result {
        Err(Error::MissingArtifact { path, .. }) => {
            assert_eq!(path, dir.join("build").join("hello_world.elf"))
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(h.names().is_empty());
}

#[test]
fn empty_plan_is_a_success() {
    let dir = project("empty");
    let (h, result) = Harness::run(settings(&dir).finalize(), &[], &[], None);

    result.unwrap();
    assert!(h.names().is_empty());
}

#[test]
fn relative_directories_are_resolved_once() {
    let dir = relative_project("relative");
    assert!(dir.is_relative());

    let cases = vec![
        settings(&dir).port("COM5").finalize(),
        // Default project directory, build directory given on its own.
        idf::SettingsBuilder::new()
            .build_dir(dir.join("build"))
            .port("COM5")
            .finalize(),
    ];
    for settings in cases {
        let (h, result) = Harness::run(
            settings,
            &[Action::EraseFlash, Action::Flash, Action::Monitor],
            &[],
            None,
        );
        result.unwrap();
        assert_eq!(h.names(), vec!["esptool.py", "flash", "idf_monitor"]);

        for (name, command) in h.calls.borrow().iter() {
            assert!(
                command.cwd.is_dir(),
                "{} runs in missing directory {}",
                name,
                command.cwd.display()
            );
        }

        // Path arguments must name the same files from inside the working
        // directory of the tool.
        let flash = h.command(1);
        let build = flash
            .args
            .iter()
            .skip_while(|a| *a != "--build")
            .nth(1)
            .unwrap();
        assert!(
            flash.cwd.join(build).join(FLASHER_ARGS).is_file(),
            "{} from {}",
            build,
            flash.cwd.display()
        );

        let monitor = h.command(2);
        let elf = monitor.args.iter().find(|a| a.ends_with(".elf")).unwrap();
        assert!(
            monitor.cwd.join(elf).is_file(),
            "{} from {}",
            elf,
            monitor.cwd.display()
        );
    }
}

#[test]
fn monitor_reports_missing_device_before_missing_build() {
    let dir = project("nodevice-nobuild");
    fs::remove_dir_all(dir.join("build")).unwrap();
    let (h, result) = Harness::run(settings(&dir).finalize(), &[Action::Monitor], &[], None);

    assert!(matches!(result, Err(Error::NoDeviceFound)));
    assert!(h.names().is_empty());
}
