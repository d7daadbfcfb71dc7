//! confweave CLI - load and inspect merged configurations.
//!
//! Commands:
//! - `confweave show`: Print the merged configuration as INI or JSON
//! - `confweave sections`: List section names
//! - `confweave get <section> <option>`: Print one option
//! - `confweave clear-cache`: Delete the cache file
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error

use clap::Parser;
use tracing_subscriber::EnvFilter;

use confweave_cli::commands;
use confweave_cli::Cli;

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("confweave=debug,confweave_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(result_to_exit(commands::run(&cli)));
}

/// Print the output or the error chain and convert to an exit code.
fn result_to_exit(result: anyhow::Result<String>) -> i32 {
    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confweave_cli::{Commands, OutputFormat};

    #[test]
    fn test_cli_parsing_show_defaults() {
        let cli = Cli::try_parse_from(["confweave", "show"]).unwrap();
        assert!(!cli.debug);
        assert!(!cli.robust);
        assert_eq!(cli.config.to_str(), Some("app.conf"));
        assert_eq!(cli.config_section, "import");
        match cli.command {
            Commands::Show {
                format,
                section,
                raw,
            } => {
                assert_eq!(format, OutputFormat::Ini);
                assert!(section.is_none());
                assert!(!raw);
            }
            _ => panic!("Expected Show command"),
        }
    }

    #[test]
    fn test_cli_parsing_show_json_section() {
        let cli = Cli::try_parse_from([
            "confweave", "show", "--format", "typed-json", "--section", "db",
        ])
        .unwrap();
        match cli.command {
            Commands::Show {
                format, section, ..
            } => {
                assert_eq!(format, OutputFormat::TypedJson);
                assert_eq!(section.as_deref(), Some("db"));
            }
            _ => panic!("Expected Show command"),
        }
    }

    #[test]
    fn test_cli_parsing_repeated_overrides() {
        let cli = Cli::try_parse_from([
            "confweave", "-o", "site.conf", "get", "db", "host", "--override", "db.host=x",
        ])
        .unwrap();
        assert_eq!(cli.overrides, vec!["site.conf", "db.host=x"]);
        match cli.command {
            Commands::Get {
                section,
                option,
                typed,
            } => {
                assert_eq!(section, "db");
                assert_eq!(option, "host");
                assert!(!typed);
            }
            _ => panic!("Expected Get command"),
        }
    }

    #[test]
    fn test_cli_parsing_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "confweave",
            "sections",
            "--debug",
            "--robust",
            "--config",
            "root.yml",
            "--config-section",
            "imports",
            "--cache",
            "/tmp/c.json",
        ])
        .unwrap();
        assert!(cli.debug);
        assert!(cli.robust);
        assert_eq!(cli.config.to_str(), Some("root.yml"));
        assert_eq!(cli.config_section, "imports");
        assert_eq!(cli.cache.as_ref().and_then(|p| p.to_str()), Some("/tmp/c.json"));
        assert!(matches!(cli.command, Commands::Sections));
    }

    #[test]
    fn test_cli_parsing_requires_subcommand() {
        assert!(Cli::try_parse_from(["confweave"]).is_err());
        assert!(Cli::try_parse_from(["confweave", "get", "db"]).is_err());
        assert!(Cli::try_parse_from(["confweave", "show", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_result_to_exit() {
        assert_eq!(result_to_exit(Ok(String::new())), 0);
        assert_eq!(result_to_exit(Err(anyhow::anyhow!("something failed"))), 1);
    }
}
