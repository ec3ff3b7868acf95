//! `opmode` - inspect and drive the persisted operation mode

mod commands;
mod config;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command as Cli};
use opmode_core::logging::{init_tracing, LogFormat};
use opmode_core::{JsonFileStore, ModeController, PersistenceGateway};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use commands::{execute, Command};
use config::CliConfig;

fn cli() -> Cli {
    Cli::new("opmode")
        .version(opmode_core::VERSION)
        .about("Operation mode controller for the audit tool (REAL / DEMO)")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("State file (overrides config)"),
        )
        .subcommand(
            Cli::new("status").about("Show mode, health and settings").arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Output as JSON"),
            ),
        )
        .subcommand(
            Cli::new("demo").about("Switch to DEMO mode").arg(
                Arg::new("reason")
                    .long("reason")
                    .default_value("manual switch")
                    .help("Reason recorded with the switch"),
            ),
        )
        .subcommand(Cli::new("real").about("Switch to REAL mode"))
        .subcommand(Cli::new("toggle").about("Flip between REAL and DEMO"))
        .subcommand(Cli::new("settings").about("Print current settings"))
        .subcommand(
            Cli::new("set")
                .about("Change one setting (values out of range are clamped)")
                .arg(Arg::new("field").required(true).help("Setting name, e.g. maxConsecutiveFailures"))
                .arg(Arg::new("value").required(true).help("New value")),
        )
        .subcommand(
            Cli::new("fail")
                .about("Report connection failures")
                .arg(
                    Arg::new("count")
                        .long("count")
                        .default_value("1")
                        .value_parser(value_parser!(u32))
                        .help("Number of failures to report"),
                )
                .arg(
                    Arg::new("context")
                        .long("context")
                        .default_value("cli")
                        .help("Operation the failures belong to"),
                )
                .arg(
                    Arg::new("critical")
                        .long("critical")
                        .action(ArgAction::SetTrue)
                        .help("Mark the operation critical while reporting"),
                ),
        )
        .subcommand(Cli::new("succeed").about("Report a successful call"))
        .subcommand(Cli::new("reset").about("Clear health and switch reason"))
}

fn command_from(matches: &ArgMatches) -> anyhow::Result<Command> {
    let string = |m: &ArgMatches, id: &str| m.get_one::<String>(id).cloned().unwrap_or_default();
    let command = match matches.subcommand() {
        Some(("status", m)) => Command::Status {
            json: m.get_flag("json"),
        },
        Some(("demo", m)) => Command::Demo {
            reason: string(m, "reason"),
        },
        Some(("real", _)) => Command::Real,
        Some(("toggle", _)) => Command::Toggle,
        Some(("settings", _)) => Command::Settings,
        Some(("set", m)) => Command::Set {
            field: string(m, "field"),
            value: string(m, "value"),
        },
        Some(("fail", m)) => Command::Fail {
            count: m.get_one::<u32>("count").copied().unwrap_or(1),
            context: string(m, "context"),
            critical: m.get_flag("critical"),
        },
        Some(("succeed", _)) => Command::Succeed,
        Some(("reset", _)) => Command::Reset,
        other => anyhow::bail!("unknown command {:?}", other.map(|(name, _)| name)),
    };
    Ok(command)
}

fn run(matches: &ArgMatches) -> anyhow::Result<String> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    let format = if config.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    init_tracing(config.log_filter(), format);

    let state_file = matches
        .get_one::<PathBuf>("state")
        .cloned()
        .unwrap_or_else(|| config.state_file());
    tracing::debug!(path = %state_file.display(), "Opening state file");

    let gateway = PersistenceGateway::new(Arc::new(JsonFileStore::new(state_file)));
    let controller = ModeController::restore(gateway);

    if let Some(settings) = config.settings_value()? {
        if let Err(err) = controller.update_settings_from_value(&settings) {
            tracing::warn!(%err, "Ignoring invalid [settings] entries");
        }
    }

    execute(&controller, command_from(matches)?)
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    match run(&matches) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
