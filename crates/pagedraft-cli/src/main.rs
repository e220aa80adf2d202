//! `pagedraft` - load and push landing-page drafts from the command line

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use config::PagedraftConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "pagedraft=info";
const DEFAULT_PREFERENCES: &str = ".pagedraft/preferences.json";

fn cli() -> Command {
    let document = Arg::new("document")
        .required(true)
        .help("Page identifier");
    let file = Arg::new("file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON object keyed by section (content-blocks, social-links, design, settings)");

    Command::new("pagedraft")
        .version(pagedraft_core::VERSION)
        .about("Draft synchronization client for the page editor")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("pagedraft.toml with [session] and [transport] tables"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("load")
                .about("Fetch every section of a page")
                .arg(document.clone())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print sections as JSON"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show which sections a file would change")
                .arg(document.clone())
                .arg(file.clone()),
        )
        .subcommand(
            Command::new("push")
                .about("Persist the sections of a file that differ from the server")
                .arg(document)
                .arg(file),
        )
        .subcommand(
            Command::new("autosave")
                .about("Show or change the autosave preference")
                .arg(
                    Arg::new("action")
                        .required(true)
                        .value_parser(["on", "off", "show"]),
                )
                .arg(
                    Arg::new("preferences")
                        .long("preferences")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(DEFAULT_PREFERENCES)
                        .help("Preference file"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn required<'a, T>(args: &'a ArgMatches, name: &str) -> Result<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    args.get_one::<T>(name)
        .with_context(|| format!("missing argument <{name}>"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let config = PagedraftConfig::load(config_path).context("cannot load configuration")?;
    match config_path {
        Some(path) => tracing::debug!("Configuration loaded from {}", path.display()),
        None => tracing::debug!("Using default configuration"),
    }

    match matches.subcommand() {
        Some(("load", args)) => {
            let document = required::<String>(args, "document")?;
            commands::load(&config, document, args.get_flag("json")).await
        }
        Some(("status", args)) => {
            let document = required::<String>(args, "document")?;
            let file = required::<PathBuf>(args, "file")?;
            commands::status(&config, document, file).await
        }
        Some(("push", args)) => {
            let document = required::<String>(args, "document")?;
            let file = required::<PathBuf>(args, "file")?;
            commands::push(&config, document, file).await
        }
        Some(("autosave", args)) => {
            let action = commands::parse_autosave_action(required::<String>(args, "action")?)?;
            let preferences = required::<PathBuf>(args, "preferences")?;
            commands::autosave(&config, Path::new(preferences), action)
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
