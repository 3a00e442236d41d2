//! matcall - call MATLAB engine functions from the command line
//!
//! Starts the configured engine bridge process, evaluates or calls what was
//! asked for, and prints the converted result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, info};
use matcall_config::{ConfigLoader, LogLevel, MatcallConfig};
use matcall_core::{HostValue, MatFunction, MatcallError, Session};
use matcall_wire::StdioEngine;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "matcall",
    version = env!("CARGO_PKG_VERSION"),
    about = "Call MATLAB engine functions and classes from the command line",
    after_help = r#"
Environment Variables:
  MATCALL_CONFIG=<path>          Path to configuration file
  MATCALL_ENGINE_COMMAND=<cmd>   Engine bridge executable
  MATCALL_ENGINE_ARGS="<args>"   Engine bridge arguments (whitespace separated)
  MATLABPATH=<dirs>              Extra search paths added on start
  MATCALL_LOG_LEVEL=warn         Set log level (error, warn, info, debug, trace)
  MATCALL_DEBUG=1                Enable debug logging

Examples:
  matcall eval "sqrt(4)"
  matcall call max 3 7 --nargout 2
  matcall run "x = magic(3)"
  matcall help sqrt
"#
)]
#[command(propagate_version = true, disable_help_subcommand = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Set log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    /// Configuration file path
    #[arg(long, env = "MATCALL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Engine bridge executable
    #[arg(long, global = true)]
    engine_command: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Evaluate an expression and print its value
    Eval {
        /// Expression or statement
        expr: String,

        /// Output count; negative infers it from the expression
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        nargout: i32,
    },
    /// Call a function with literal arguments
    Call {
        /// Function name, or `@`-expression
        name: String,

        /// Arguments: numbers, true/false, anything else is text
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,

        /// Output count; negative uses the declared count
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        nargout: i32,
    },
    /// Run statements and print the console output
    Run {
        /// Statements; a trailing `;` suppresses output
        code: String,
    },
    /// Show the help text of a function
    Help {
        /// Function name
        name: String,
    },
    /// Show version and session configuration
    Info,
    /// Configuration management
    Config {
        #[command(subcommand)]
        config_command: ConfigCommand,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Show configuration file locations
    Path,
    /// Write the current configuration to a file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = ".matcall.toml")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", describe_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = ConfigLoader::load_with(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli);

    env_logger::Builder::from_env(Env::default().default_filter_or(config.logging.filter()))
        .init();

    info!("matcall v{} starting", env!("CARGO_PKG_VERSION"));
    debug!("Configuration loaded: {config:?}");

    match cli.command {
        Commands::Eval { expr, nargout } => {
            let session = start_session(&config)?;
            print_value(&session.eval(&expr, nargout)?);
        }
        Commands::Call {
            name,
            args,
            nargout,
        } => {
            let session = start_session(&config)?;
            let function = MatFunction::new(&session, &name, nargout)?;
            let args: Vec<HostValue> = args.iter().map(|arg| parse_argument(arg)).collect();
            print_value(&function.call(&args)?);
        }
        Commands::Run { code } => {
            let session = start_session(&config)?;
            if let Some(text) = session.run(&code)? {
                print!("{text}");
            }
        }
        Commands::Help { name } => {
            let session = start_session(&config)?;
            let function = MatFunction::new(&session, &name, -1)?;
            println!("{}", function.doc()?);
        }
        Commands::Info => show_info(&config),
        Commands::Config { config_command } => handle_config_command(config_command, &config)?,
    }
    Ok(())
}

fn apply_cli_overrides(config: &mut MatcallConfig, cli: &Cli) {
    if cli.debug {
        config.logging.debug = true;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(command) = &cli.engine_command {
        config.engine.command = command.clone();
    }
}

fn start_session(config: &MatcallConfig) -> Result<Arc<Session>> {
    let engine = StdioEngine::spawn(&config.engine.command, &config.engine.args)
        .with_context(|| format!("Failed to start engine process '{}'", config.engine.command))?;
    let session = Session::start(
        engine,
        &config.session.search_paths,
        config.session.recursive,
    )?;
    Ok(session)
}

fn print_value(value: &HostValue) {
    if !value.is_none() {
        println!("{value}");
    }
}

/// Command-line argument to host value: `true`/`false`, numbers, else text.
fn parse_argument(arg: &str) -> HostValue {
    match arg {
        "true" => HostValue::Bool(true),
        "false" => HostValue::Bool(false),
        _ => match arg.parse::<f64>() {
            Ok(number) => HostValue::Float(number),
            Err(_) => {
                let text = arg
                    .strip_prefix('\'')
                    .and_then(|rest| rest.strip_suffix('\''))
                    .unwrap_or(arg);
                HostValue::from(text)
            }
        },
    }
}

fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<MatcallError>() {
        Some(MatcallError::Engine(engine)) => format!("Error: {}", engine.display_message()),
        _ => format!("Error: {err:#}"),
    }
}

fn show_info(config: &MatcallConfig) {
    println!("matcall v{}", env!("CARGO_PKG_VERSION"));
    println!();
    match ConfigLoader::locate() {
        Some(path) => println!("Config file:    {}", path.display()),
        None => println!("Config file:    (defaults)"),
    }
    println!("Engine command: {}", config.engine.command);
    if !config.engine.args.is_empty() {
        println!("Engine args:    {}", config.engine.args.join(" "));
    }
    println!("Log filter:     {}", config.logging.filter());
    println!(
        "Search paths:   {}{}",
        config.session.search_paths.len(),
        if config.session.recursive {
            " (recursive)"
        } else {
            ""
        }
    );
    for path in &config.session.search_paths {
        println!("  {}", path.display());
    }
}

fn handle_config_command(config_command: ConfigCommand, config: &MatcallConfig) -> Result<()> {
    match config_command {
        ConfigCommand::Show => {
            println!("Current matcall Configuration:");
            println!("==============================");
            let yaml =
                serde_yaml::to_string(config).context("Failed to serialize configuration")?;
            println!("{yaml}");
        }
        ConfigCommand::Path => {
            println!("Configuration file search order:");
            for path in ConfigLoader::find_config_files() {
                let marker = if path.is_file() { "*" } else { " " };
                println!("{marker} {}", path.display());
            }
        }
        ConfigCommand::Generate { output } => {
            ConfigLoader::save_to_file(config, &output)
                .with_context(|| format!("Failed to write config to {}", output.display()))?;
            println!("Configuration written to {}", output.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_argument() {
        assert_eq!(parse_argument("true"), HostValue::Bool(true));
        assert_eq!(parse_argument("-2.5"), HostValue::Float(-2.5));
        assert_eq!(parse_argument("'hi'"), HostValue::from("hi"));
        assert_eq!(parse_argument("plain"), HostValue::from("plain"));
    }

    #[test]
    fn test_engine_errors_drop_their_prefix() {
        let err = anyhow::Error::from(MatcallError::Engine(
            matcall_core::EngineError::new("Error: Undefined function 'nope'."),
        ));
        assert_eq!(describe_error(&err), "Error: Undefined function 'nope'.");
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["matcall", "eval", "x == 5", "--debug", "-n", "1"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Eval { expr, nargout } => {
                assert_eq!(expr, "x == 5");
                assert_eq!(nargout, 1);
            }
            _ => panic!("expected eval"),
        }
    }
}
