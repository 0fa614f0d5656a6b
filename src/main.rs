use arrow::util::pretty::pretty_format_batches;
use coral_datasets::cli::{Cli, Command};
use coral_datasets::config::Config;
use coral_datasets::error::AppError;
use coral_datasets::storage::{StorageBackend, StorageError, StorageFactory};
use coral_datasets::{ingest, telemetry};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, Level};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if cli.command == Command::Examples {
        Cli::print_examples();
        return ExitCode::SUCCESS;
    }

    let _telemetry = telemetry::init_telemetry();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode, AppError> {
    let config = Config::from_sources(cli)?;
    let storage = StorageFactory::from_config(&config.storage).await?;
    execute(&cli.command, storage).await
}

async fn execute(command: &Command, storage: Arc<dyn StorageBackend>) -> Result<ExitCode, AppError> {
    match command {
        Command::List => {
            for name in storage.list_datasets().await? {
                println!("{}", name);
            }
        }
        Command::CheckName { name } => {
            if storage.name_is_available(name).await? {
                println!("'{}' is available", name);
            } else {
                println!("'{}' is already taken or not a valid name", name);
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Add {
            file,
            name,
            overwrite,
        } => {
            let name = name
                .clone()
                .or_else(|| ingest::default_name(file))
                .ok_or_else(|| StorageError::InvalidInput("cannot derive a dataset name".to_string()))?;
            let table = ingest::read_table(file)?;

            let key = if *overwrite {
                storage.add_to_database(&table, &name).await?
            } else {
                storage.insert_dataset(&table, &name).await?
            };
            println!(
                "Stored {} rows x {} columns as {}",
                table.num_rows(),
                table.num_columns(),
                key
            );
        }
        Command::Show { name, rows } => {
            let dataset = storage.load_dataset(name).await?;
            let total = dataset.table.num_rows();
            let shown = (*rows).min(total);
            println!("{}", dataset.table.schema());
            println!("{}", pretty_format_batches(&[dataset.table.slice(0, shown)])?);
            println!("{} of {} rows shown", shown, total);
        }
        Command::Info { name } => {
            let info = storage.dataset_info(name).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Remove { name } => {
            if storage.remove_dataset(name).await {
                println!("Removed {}", name);
            } else {
                eprintln!("Could not remove {}", name);
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Examples => Cli::print_examples(),
    }

    Ok(ExitCode::SUCCESS)
}
