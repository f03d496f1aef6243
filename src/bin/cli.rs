//! idfcom command line interface.

use std::{process, str::FromStr};

use clap::{crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;
use strum::VariantNames;

use idfcom::{
    self as idf, commandline_options, Action, ActionTable, EnvironmentSnapshot, Executor, Plan,
};

fn main() -> miette::Result<()> {
    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(130);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let actions_help = Action::ALL
        .iter()
        .map(|a| format!("  {:<24}{}", a.to_string(), a.help()))
        .collect::<Vec<_>>()
        .join("\n");
    let after_help = format!("ACTIONS:\n{}", actions_help);

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .about(crate_description!())
        .long_about(
            "\n\
            Flash ESP-IDF projects over the serial port and watch their \
            console output. Several actions can be given at once, in any \
            order; they always run in a valid order, e.g. `erase_flash` \
            before `flash` and `flash` before `monitor`. Execution stops at \
            the first action that fails.\n\
            \n\
            When no serial port is given with `-p` or `ESPPORT`, the \
            connected serial device whose name sorts last is used.\
        ",
        )
        .after_help(after_help.as_str())
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("ACTIONS")
                .help("actions to execute")
                .required(true)
                .multiple(true)
                .possible_values(Action::VARIANTS)
                .hide_possible_values(true),
        )
        .arg(
            Arg::with_name("PROJECT_DIR")
                .help("project directory")
                .short("C")
                .long("project-dir")
                .takes_value(true)
                .default_value("."),
        )
        .arg(
            Arg::with_name("BUILD_DIR")
                .help("build directory [default: <project-dir>/build]")
                .long("build-dir")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("PORT")
                .help("serial port")
                .long_help(
                    "serial port; when not set, `ESPPORT` is used, and \
                     otherwise the connected device whose name sorts last.",
                )
                .short("p")
                .long("port")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("BAUD")
                .help("baud rate for flashing")
                .long_help(
                    "baud rate for flashing; when not set, `ESPBAUD` is used, \
                     and otherwise 460800.",
                )
                .short("b")
                .long("baud")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("MONITOR_BAUD")
                .help("baud rate for monitor")
                .long_help(
                    "baud rate for monitor; when not set, the IDF_MONITOR_BAUD \
                     and MONITORBAUD environment variables and \
                     project_description.json in the build directory are \
                     checked, in that order.",
                )
                .short("B")
                .long("monitor-baud")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("PRINT_FILTER")
                .help("filter monitor output")
                .long_help(
                    "filter monitor output; a series of <tag>:<log_level> \
                     items where <log_level> is one of N, E, W, I, D, V or *. \
                     For example \"tag1:W\" only prints the output of \
                     ESP_LOGW(\"tag1\", ...) and lower verbosity levels.",
                )
                .long("print-filter")
                .alias("print_filter")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ENCRYPTED")
                .help("enable encrypted flash targets in the monitor")
                .long_help(
                    "enable encrypted flash targets in the monitor; set \
                     automatically when `encrypted-flash` or \
                     `encrypted-app-flash` runs together with `monitor`.",
                )
                .short("E")
                .long("encrypted"),
        )
        .arg(
            Arg::with_name("PYTHON")
                .help("python interpreter running the ESP-IDF tools")
                .long("python")
                .takes_value(true)
                .default_value("python"),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'idfcom -v -v -v' or 'idfcom -vvv' vs 'idfcom -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .expect("Failed to initialize the logger!");

    trace!("{:#?}", matches);

    // A broken table is a programming error, report it before doing anything.
    ActionTable::standard().validate()?;

    let env = EnvironmentSnapshot::capture();

    // Arguments with default values ===========================================

    let project_dir = matches.value_of("PROJECT_DIR").unwrap_or(".");
    let python = matches.value_of("PYTHON").unwrap_or("python");

    let mut builder = idf::SettingsBuilder::new()
        .project_dir(project_dir)
        .python(python)
        .encrypted(matches.is_present("ENCRYPTED"))
        .rerun_command(commandline_options(std::env::args()));

    // START - Arguments with NO default values ================================

    if let Some(build_dir) = matches.value_of("BUILD_DIR") {
        builder = builder.build_dir(build_dir);
    }

    if let Some(port) = matches.value_of("PORT") {
        builder = builder.port(port);
    }

    if matches.is_present("BAUD") {
        builder = builder.baud(parse_baud(&matches, "BAUD", "baud"));
    }

    if matches.is_present("MONITOR_BAUD") {
        builder = builder.monitor_baud(parse_baud(&matches, "MONITOR_BAUD", "monitor-baud"));
    }

    if let Some(filter) = matches.value_of("PRINT_FILTER") {
        builder = builder.print_filter(filter);
    }

    // END - Arguments =========================================================

    let settings = builder.finalize();
    debug!("{:#?}", settings);

    let mut requested = vec![];
    for name in matches.values_of("ACTIONS").into_iter().flatten() {
        let action = Action::from_str(name).map_err(|_| idf::Error::UnknownAction(name.into()))?;
        requested.push(action);
    }
    let plan = Plan::schedule(&requested);

    // Run the session =========================================================

    let mut session = idf::session::factory(settings, plan, Executor::system(env));
    session.run()?;
    Ok(())
}

/// Exit with a friendly message when a baud rate is not numeric, the same way
/// other invalid option values are reported.
fn parse_baud(matches: &clap::ArgMatches, name: &str, long: &str) -> u32 {
    value_t!(matches.value_of(name), u32).unwrap_or_else(|_| {
        println!(
            "{}: `{}` needs to be a numeric value",
            style("error").red(),
            style(long).cyan()
        );
        println!(
            "   {} `{}` is not a valid value",
            style("-->").cyan(),
            style(matches.value_of(name).unwrap_or_default()).on_red()
        );
        process::exit(-1);
    })
}
