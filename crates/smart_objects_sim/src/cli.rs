//! Command-line interface handling for the smart object simulation.
//!
//! Arguments override values from the configuration file; anything left
//! unset keeps the file's value.

use clap::{Arg, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the number of simulated agents
    pub agents: Option<usize>,
    /// Optional override for the tick budget (0 runs until interrupted)
    pub ticks: Option<u64>,
}

fn command() -> Command {
    Command::new("Smart Object Simulation")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Headless host driving agents through smart object search, claim and use")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("smart_objects.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("agents")
                .short('a')
                .long("agents")
                .value_name("COUNT")
                .help("Number of simulated agents")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("ticks")
                .short('t')
                .long("ticks")
                .value_name("COUNT")
                .help("Ticks to simulate before shutting down (0 = until Ctrl+C)")
                .value_parser(clap::value_parser!(u64)),
        )
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list. The first item is the program name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("smart_objects.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            agents: matches.get_one::<usize>("agents").copied(),
            ticks: matches.get_one::<u64>("ticks").copied(),
        }
    }
}
