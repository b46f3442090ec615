//! trk - ftrack tasks, rig syncing and render uploads from the shell.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use trackrig::cli::{Cli, Commands, ConfigCommands, RigCommands, TaskCommands};
use trackrig::commands::{self, Output};
use trackrig::config::{ConfigOverrides, ResolvedSettings, resolve_settings};
use trackrig::host::LinkTable;
use trackrig::http::HttpTransport;
use trackrig::models::TrackerState;

/// Environment variable holding the log filter
const LOG_ENV: &str = "TRK_LOG";

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    init_logging(cli.verbose);

    if let Err(e) = run_command(cli) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Log to stderr, filtered by `TRK_LOG` (default `warn`, `-v` gives `debug`).
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_command(cli: Cli) -> Result<(), trackrig::Error> {
    let human = cli.human_readable;
    let mut overrides = ConfigOverrides::new();
    if let Some(url) = cli.server_url {
        overrides = overrides.with_server_url(url);
    }
    if let Some(user) = cli.username {
        overrides = overrides.with_username(user);
    }

    match cli.command {
        Commands::Projects => {
            let settings = resolve_settings(&overrides)?;
            let mut state = TrackerState::new();
            let result = commands::projects(&settings, HttpTransport::insecure()?, &mut state)?;
            output(&result, human);
        }
        Commands::Tasks { project } => {
            let settings = resolve_settings(&overrides)?;
            let mut state = TrackerState::new();
            let result = commands::tasks(
                &settings,
                HttpTransport::insecure()?,
                &mut state,
                project.as_deref(),
            )?;
            output(&result, human);
        }
        Commands::Task { command } => match command {
            TaskCommands::Url { task_id, project } => {
                let settings = resolve_settings(&overrides)?;
                let result = commands::task_url(&settings, &task_id, &project)?;
                output(&result, human);
            }
        },
        Commands::Upload {
            task_id,
            file,
            asset_name,
        } => {
            let settings = resolve_settings(&overrides)?;
            let result = commands::upload(
                &settings,
                HttpTransport::insecure()?,
                &task_id,
                &file,
                asset_name.as_deref(),
            )?;
            output(&result, human);
        }
        Commands::Rig { manifest, command } => {
            if let Some(source) = manifest {
                overrides = overrides.with_manifest_url(source);
            }
            let settings = resolve_settings(&overrides)?;
            run_rig_command(command, &settings, human)?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let settings = resolve_settings(&overrides)?;
                output(&commands::config_show(&settings), human);
            }
            ConfigCommands::Set { key, value } => {
                output(&commands::config_set(&key, &value)?, human);
            }
            ConfigCommands::Unset { key } => {
                output(&commands::config_unset(&key)?, human);
            }
        },
    }

    Ok(())
}

fn run_rig_command(
    command: RigCommands,
    settings: &ResolvedSettings,
    human: bool,
) -> Result<(), trackrig::Error> {
    let transport = HttpTransport::new();

    match command {
        RigCommands::List => {
            output(&commands::rig_list(&transport, settings), human);
        }
        RigCommands::Download {
            rig_id,
            document,
            links,
        } => {
            let table = open_table(&links, document)?;
            let result = commands::rig_download(&transport, settings, &table, &rig_id)?;
            output(&result, human);
        }
        RigCommands::Link {
            rig_id,
            document,
            links,
        } => {
            let mut table = open_table(&links, document)?;
            let result = commands::rig_link(&transport, settings, &mut table, &rig_id)?;
            table.save()?;
            output(&result, human);
        }
        RigCommands::Status { links } => {
            let table = LinkTable::open(&links)?;
            output(&commands::rig_status(&transport, settings, &table), human);
        }
        RigCommands::Update { path, links } => {
            let mut table = LinkTable::open(&links)?;
            let result = commands::rig_update(&transport, settings, &mut table, &path)?;
            if result.updated {
                table.save()?;
            }
            output(&result, human);
        }
        RigCommands::Versions { path, links } => {
            let table = LinkTable::open(&links)?;
            let result = commands::rig_versions(&transport, settings, &table, &path)?;
            output(&result, human);
        }
        RigCommands::Switch {
            path,
            version,
            links,
        } => {
            let mut table = LinkTable::open(&links)?;
            let result = commands::rig_switch(&transport, settings, &mut table, &path, &version)?;
            table.save()?;
            output(&result, human);
        }
        RigCommands::Inspect { filename } => {
            output(&commands::rig_inspect(&filename), human);
        }
    }

    Ok(())
}

/// Open a link table, recording `document` as its saved document if given.
fn open_table(links: &Path, document: Option<PathBuf>) -> Result<LinkTable, trackrig::Error> {
    let mut table = LinkTable::open(links)?;
    if let Some(document) = document {
        table.set_document(std::path::absolute(&document)?);
    }
    Ok(table)
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
