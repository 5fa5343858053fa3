use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;

use model_refactor::config::{self, Config, DEFAULT_CONFIG_FILE};
use model_refactor::utils::logging::init_logging;
use model_refactor::{
    DatabaseConnection, DatabaseMetadataProvider, FileSnapshotStore, MetadataProvider,
    ModelRefactor, ModelRegistry, RefactorOutcome, RefactorRequest, RenameHints,
};

#[derive(Parser)]
#[command(name = "model_refactor")]
#[command(version)]
#[command(about = "Rename ORM models across a codebase and generate the matching migration")]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the current structure of a model
    Snapshot {
        /// Fully-qualified class name of the model
        model: String,
    },

    /// Rewrite references to a renamed model and write its migration
    Refactor {
        /// Class name the snapshot was taken under
        old: String,

        /// Class name after the rename
        #[arg(long)]
        new: Option<String>,

        /// Report what would change without touching any file
        #[arg(long)]
        dry_run: bool,

        /// Column rename as old=new, repeatable
        #[arg(long = "rename-column", value_name = "OLD=NEW")]
        rename_columns: Vec<String>,

        /// Source tree to rewrite (defaults to paths.code_root)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Print the changes between the stored snapshot and the current model
    Diff {
        old: String,

        #[arg(long)]
        new: Option<String>,

        #[arg(long = "rename-column", value_name = "OLD=NEW")]
        rename_columns: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let level = match cli.verbose {
        0 => None,
        1 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    };
    init_logging(&config.logging, level).context("Failed to initialize logging")?;

    let mut registry = ModelRegistry::new(&config);
    let discovered = registry
        .scan_and_register(&config)
        .context("Failed to scan model sources")?;
    tracing::info!(models = discovered, "Registered models");

    match &config.database {
        Some(database) => {
            let connection = DatabaseConnection::connect(database)
                .await
                .context("Failed to connect to database")?;
            let provider =
                DatabaseMetadataProvider::load(&connection, &registry, database.schema.as_deref())
                    .await
                    .context("Failed to introspect database")?;
            connection.close().await;

            run(cli.command, config.clone(), provider)
        }
        None => run(cli.command, config.clone(), &registry),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => config::load_from_file(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG_FILE)),
        None => Ok(Config::default()),
    }
}

fn run<P: MetadataProvider>(command: Commands, config: Config, provider: P) -> Result<()> {
    let store = FileSnapshotStore::new(config.snapshot_directory());
    let client = ModelRefactor::new(config, provider, store);

    match command {
        Commands::Snapshot { model } => {
            let snapshot = client.snapshot(&model)?;
            println!(
                "Snapshot of {} saved to {}",
                snapshot.class_name(),
                client.store().path_for(snapshot.class_name()).display()
            );
        }
        Commands::Diff {
            old,
            new,
            rename_columns,
        } => {
            let hints = RenameHints::parse(&rename_columns)?;
            let changes = client.plan(&old, new.as_deref().unwrap_or(&old), &hints)?;
            println!("{}", changes.to_pretty_json()?);
        }
        Commands::Refactor {
            old,
            new,
            dry_run,
            rename_columns,
            root,
        } => {
            let mut request = RefactorRequest::new(&old)
                .dry_run(dry_run)
                .hints(RenameHints::parse(&rename_columns)?);
            if let Some(new) = &new {
                request = request.to(new);
            }
            if let Some(root) = root {
                request = request.root(root);
            }

            let summary = match client.refactor(&request)? {
                RefactorOutcome::NoChanges => {
                    println!("No changes detected for {}", old);
                    return Ok(());
                }
                RefactorOutcome::Completed(summary) => summary,
            };

            println!("{}", summary.changes.to_pretty_json()?);

            let verb = if dry_run { "Would modify" } else { "Modified" };
            for edit in &summary.report.edits {
                println!("{} {} ({} replacements)", verb, edit.path.display(), edit.replacements);
            }
            for error in &summary.report.errors {
                eprintln!("Skipped: {}", error);
            }

            if let Some(migration) = &summary.migration {
                let config = client.config();
                if dry_run {
                    println!("Would write migration {}", migration.name);
                    println!("{}", migration.render(config.migrations.driver));
                } else {
                    let path = migration
                        .write_to(&config.migrations_directory(), config.migrations.driver)
                        .context("Failed to write migration")?;
                    println!("Wrote migration {}", path.display());
                }
            }
        }
    }

    Ok(())
}
