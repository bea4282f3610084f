use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use utgen_core::DEFAULT_CONFIG_PATH;

mod commands;

use commands::generate::GenerateArgs;

/// Exit code for errors that stop the run before any unit is processed
const EXIT_ERROR: i32 = 2;

fn cli() -> Command {
    Command::new("utgen")
        .version(utgen_core::VERSION)
        .about("Generate GoogleTest suites with an LLM until they build and meet coverage targets")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter (overridden by RUST_LOG)"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate, fix and refine tests for every source file under the input directory")
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory containing the C++ sources under test"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .default_value("generated_tests")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory receiving the generated test files"),
                )
                .arg(config_arg())
                .arg(
                    Arg::new("instructions")
                        .long("instructions")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory of YAML prompt template overrides"),
                )
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .value_parser(value_parser!(usize))
                        .help("Units processed concurrently (overrides the config)"),
                )
                .arg(
                    Arg::new("keep-history")
                        .long("keep-history")
                        .action(ArgAction::SetTrue)
                        .help("Keep every revision and build log under <output>/.history"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the run summary as JSON"),
                ),
        )
        .subcommand(
            Command::new("doctor")
                .about("Check cmake, a C++ compiler, gcov and the configured provider")
                .arg(config_arg())
                .arg(
                    Arg::new("skip-provider")
                        .long("skip-provider")
                        .action(ArgAction::SetTrue)
                        .help("Do not contact the completion provider"),
                ),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write a sample configuration file")
                .arg(
                    Arg::new("path")
                        .default_value(DEFAULT_CONFIG_PATH)
                        .value_parser(value_parser!(PathBuf))
                        .help("Where to write the configuration"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite an existing file"),
                ),
        )
}

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .default_value(DEFAULT_CONFIG_PATH)
        .value_parser(value_parser!(PathBuf))
        .help("Configuration file")
}

fn init_logging(matches: &ArgMatches) {
    let level = matches
        .get_one::<String>("log-level")
        .map_or("info", String::as_str);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = matches
        .get_one::<String>("log-format")
        .is_some_and(|f| f == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn dispatch(matches: &ArgMatches) -> anyhow::Result<i32> {
    match matches.subcommand() {
        Some(("generate", args)) => commands::generate::run(GenerateArgs::from_matches(args)).await,
        Some(("doctor", args)) => {
            let config = path_arg(args, "config");
            commands::doctor::run(&config, args.get_flag("skip-provider")).await
        }
        Some(("init-config", args)) => {
            commands::init_config::run(&path_arg(args, "path"), args.get_flag("force"))
        }
        _ => Ok(EXIT_ERROR),
    }
}

fn path_arg(args: &ArgMatches, name: &str) -> PathBuf {
    args.get_one::<PathBuf>(name).cloned().unwrap_or_default()
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_logging(&matches);

    let code = match dispatch(&matches).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn generate_requires_input() {
        assert!(cli().try_get_matches_from(["utgen", "generate"]).is_err());
    }

    #[test]
    fn generate_defaults() {
        let matches = cli()
            .try_get_matches_from(["utgen", "generate", "--input", "src"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let args = GenerateArgs::from_matches(sub);
        assert_eq!(args.input, PathBuf::from("src"));
        assert_eq!(args.output, PathBuf::from("generated_tests"));
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(args.workers, None);
        assert!(!args.keep_history && !args.json);
    }

    #[test]
    fn global_log_options_follow_subcommand() {
        let matches = cli()
            .try_get_matches_from([
                "utgen", "doctor", "--log-format", "json", "--log-level", "debug",
            ])
            .unwrap();
        assert_eq!(matches.get_one::<String>("log-format").unwrap(), "json");
        assert_eq!(matches.get_one::<String>("log-level").unwrap(), "debug");
    }

    #[test]
    fn unknown_log_format_rejected() {
        assert!(cli()
            .try_get_matches_from(["utgen", "doctor", "--log-format", "xml"])
            .is_err());
    }
}
