mod cmd;
mod output;
mod prompts;

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use devup_lib::config::{self, ConfigError};
use devup_lib::{ArgValue, Project, RawArgs};

use crate::cmd::RunArgs;
use crate::output::{OutputFormat, print_error};

/// devup - bring a local development environment up and down
#[derive(Parser)]
#[command(name = "devup")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to the project file (default: nearest devup.json)
  #[arg(long, global = true, value_name = "PATH")]
  config: Option<PathBuf>,

  #[command(flatten)]
  run: RunArgs,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// List the actions declared by the project
  List {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Show run records and whether the project file changed since the last run
  Status {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },
}

fn main() -> ExitCode {
  match run(std::env::args_os().collect()) {
    Ok(code) => code,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}

fn run(argv: Vec<OsString>) -> Result<ExitCode> {
  // The project must be loaded before the real parse so its options become flags.
  let early = early_matches(&argv);
  init_tracing(early.as_ref().is_some_and(verbose));
  let explicit = early.as_ref().and_then(explicit_config);
  let project = load_project(explicit.as_deref());

  let mut command = Cli::command();
  if let Ok(project) = &project {
    command = with_custom_options(command, project);
  }
  let matches = command.get_matches_from(argv);
  let cli = Cli::from_arg_matches(&matches)?;
  debug!(config = ?cli.config, verbose = cli.verbose, "arguments parsed");

  match cli.command {
    Some(Commands::List { format }) => {
      cmd::cmd_list(&project.context("Failed to load project")?, format)?;
      Ok(ExitCode::SUCCESS)
    }
    Some(Commands::Status { format }) => {
      cmd::cmd_status(&project.context("Failed to load project")?, format)?;
      Ok(ExitCode::SUCCESS)
    }
    None => {
      let project = project.context("Failed to load project")?;
      let mut args = cli.run.raw_args();
      args.extend(custom_values(&project, &matches));
      cmd::cmd_run(&project, &args, cli.run.elevation_timeout)
    }
  }
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

/// Global flags read without failing on options that only exist once the
/// project is loaded.
fn early_matches(argv: &[OsString]) -> Option<ArgMatches> {
  Cli::command()
    .ignore_errors(true)
    .disable_help_flag(true)
    .disable_version_flag(true)
    .try_get_matches_from(argv)
    .ok()
}

fn verbose(matches: &ArgMatches) -> bool {
  let set = |matches: &ArgMatches| matches.get_one::<bool>("verbose").copied().unwrap_or(false);
  set(matches) || matches.subcommand().is_some_and(|(_, sub)| set(sub))
}

fn explicit_config(matches: &ArgMatches) -> Option<PathBuf> {
  matches
    .get_one::<PathBuf>("config")
    .or_else(|| matches.subcommand().and_then(|(_, sub)| sub.get_one::<PathBuf>("config")))
    .cloned()
}

fn load_project(explicit: Option<&std::path::Path>) -> Result<Project, ConfigError> {
  let cwd = std::env::current_dir().map_err(|source| ConfigError::Read {
    path: PathBuf::from("."),
    source,
  })?;
  let path = config::locate(explicit, &cwd)?;
  Project::load(&path)
}

/// Register each custom option of the project as `--<key>`; a one-character
/// alias becomes the short flag, a longer one a visible alias.
fn with_custom_options(mut command: Command, project: &Project) -> Command {
  for option in project.custom_options() {
    let taken = command.get_arguments().any(|arg| {
      arg.get_id() == option.key.as_str() || arg.get_long() == Some(option.key.as_str())
    });
    if taken {
      warn!(option = %option.key, "custom option shadows a built-in flag, ignoring");
      continue;
    }

    let mut arg = Arg::new(option.key.clone())
      .long(option.key.clone())
      .value_name("VALUE")
      .help(format!("Project option{}", if option.required { " (required)" } else { "" }));

    if let Some(alias) = option.alias.as_deref() {
      let mut chars = alias.chars();
      match (chars.next(), chars.next()) {
        (Some(short), None) if !short_taken(&command, short) => {
          arg = arg.short(short);
        }
        (Some(_), Some(_)) => arg = arg.visible_alias(alias.to_string()),
        _ => warn!(option = %option.key, alias, "alias unavailable, ignoring"),
      }
    }

    command = command.arg(arg);
  }
  command
}

/// `-h` and `-V` are only attached when the command is built.
fn short_taken(command: &Command, short: char) -> bool {
  matches!(short, 'h' | 'V') || command.get_arguments().any(|arg| arg.get_short() == Some(short))
}

fn custom_values(project: &Project, matches: &ArgMatches) -> RawArgs {
  project
    .custom_options()
    .into_iter()
    .filter_map(|option| {
      let value = matches.try_get_one::<String>(&option.key).ok().flatten()?;
      Some((option.key.clone(), ArgValue::Text(value.clone())))
    })
    .collect()
}
