//! Executes a single action: resolve its serial settings, build the tool
//! command line and run it.

use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    environment::{EnvironmentSnapshot, MSYSTEM},
    project::{sdkconfig_value, FlasherArgs, ProjectDescription, CORE_DUMP_DECODE},
    resolver::{ResolvedTarget, Resolver},
    tools::{
        esptool_command, monitor_command, target_command, MonitorOptions, ProcessRunner,
        ToolRunner, ESPTOOL, IDF_MONITOR,
    },
    utils::{PortEnumerator, SystemPorts},
    Action, ActionKind, Error, Plan, Settings,
};

/// Everything an action needs from the outside world: the environment, the
/// connected devices, a place to print notices and a way to run tools.
pub struct Executor {
    resolver: Resolver<Box<dyn PortEnumerator>, Box<dyn Write>>,
    runner: Box<dyn ToolRunner>,
}

impl Executor {
    pub fn new(
        env: EnvironmentSnapshot,
        ports: Box<dyn PortEnumerator>,
        out: Box<dyn Write>,
        runner: Box<dyn ToolRunner>,
    ) -> Self {
        Executor {
            resolver: Resolver::new(env, ports, out),
            runner,
        }
    }

    /// An executor enumerating the system's serial ports, printing to
    /// `stdout` and running tools as child processes.
    pub fn system(env: EnvironmentSnapshot) -> Self {
        Self::new(
            env,
            Box::new(SystemPorts),
            Box::new(io::stdout()),
            Box::new(ProcessRunner),
        )
    }

    pub fn execute(&mut self, action: Action, settings: &Settings, plan: &Plan) -> Result<(), Error> {
        info!("Executing action: {}", action);

        match action.kind() {
            ActionKind::Build => {
                let build_dir = ensure_build_dir(settings)?;
                let command = target_command(&build_dir, action, None);
                self.runner.run(&action.to_string(), &command)
            }
            ActionKind::Flash => {
                let build_dir = ensure_build_dir(settings)?;
                let target = self
                    .resolver
                    .resolve_flash(settings.port.as_deref(), settings.baud)?;
                let command = target_command(&build_dir, action, Some(&target));
                self.runner.run(&action.to_string(), &command)
            }
            ActionKind::EraseFlash => {
                let build_dir = absolute(&settings.build_dir)?;
                let flasher_args = FlasherArgs::load(&build_dir)?;
                let idf_path = self.resolver.env().idf_path()?;
                let target = self
                    .resolver
                    .resolve_flash(settings.port.as_deref(), settings.baud)?;
                let command = esptool_command(
                    &settings.python,
                    &idf_path,
                    &build_dir,
                    &target,
                    &flasher_args,
                )
                .arg("erase_flash");
                self.runner.run(ESPTOOL, &command)
            }
            ActionKind::Monitor => self.monitor(settings, plan),
        }
    }

    fn monitor(&mut self, settings: &Settings, plan: &Plan) -> Result<(), Error> {
        let port = self.resolver.resolve_port(settings.port.as_deref())?;

        let project_dir = absolute(&settings.project_dir)?;
        let build_dir = absolute(&settings.build_dir)?;
        let description = ProjectDescription::load(&build_dir)?;
        let baud = self
            .resolver
            .monitor_baud(settings.monitor_baud, &description)?;
        let target = ResolvedTarget { port, baud };

        let elf = description.elf_path(&build_dir);
        if !elf.exists() {
            return Err(Error::MissingArtifact {
                path: elf,
                hint: "You need to build & flash the project before running 'monitor', and the \
                       binary on the device must match the one in the build directory exactly. \
                       Try 'idfcom flash monitor'."
                    .into(),
            });
        }

        let idf_path = self.resolver.env().idf_path()?;
        let decode_coredumps = sdkconfig_value(&description.config_file, CORE_DUMP_DECODE)?;
        debug!("{}: {:?}", CORE_DUMP_DECODE, decode_coredumps);

        let options = MonitorOptions {
            decode_coredumps,
            print_filter: settings.print_filter.clone(),
            encrypted: settings.encrypted || plan.monitor_encrypted(),
            rerun_command: settings.rerun_command.clone(),
            winpty: self.resolver.env().contains(MSYSTEM),
        };
        let command = monitor_command(
            &settings.python,
            &idf_path,
            &project_dir,
            &build_dir,
            &target,
            &description,
            &options,
        );
        self.runner.run(IDF_MONITOR, &command)
    }
}

/// The build directory as an absolute path. Tools run inside it and also
/// receive it as an argument.
fn ensure_build_dir(settings: &Settings) -> Result<PathBuf, Error> {
    if settings.build_dir.is_dir() {
        absolute(&settings.build_dir)
    } else {
        Err(Error::MissingArtifact {
            path: settings.build_dir.clone(),
            hint: "Configure and build the project first (e.g. `idf.py build`).".into(),
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, Error> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}
