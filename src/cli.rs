use crate::error::ConfigError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "coral-datasets")]
#[command(about = "Manage tabular datasets on local disk or an S3-compatible object store")]
#[command(long_about = "Coral Datasets stores named tables as Arrow snapshots in a pluggable backend: \
a local directory or a bucket on an S3-compatible object store")]
#[command(version)]
pub struct Cli {
    /// Storage backend to use (overrides DATABASE)
    #[arg(short, long, global = true)]
    pub storage: Option<StorageKind>,

    /// Directory for the file backend
    #[arg(long, global = true)]
    pub datasets_path: Option<PathBuf>,

    /// Bucket for the remote backend
    #[arg(long, global = true)]
    pub s3_bucket: Option<String>,

    /// Object store endpoint for the remote backend
    #[arg(long, global = true)]
    pub s3_endpoint: Option<String>,

    /// AWS region for the remote backend
    #[arg(long, global = true)]
    pub aws_region: Option<String>,

    /// Configuration file path (JSON format)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List stored datasets
    List,
    /// Check whether a dataset name is free
    CheckName { name: String },
    /// Read a CSV or Arrow file and store it as a dataset
    Add {
        /// File to ingest
        file: PathBuf,
        /// Dataset name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
        /// Replace an existing dataset with the same name
        #[arg(long)]
        overwrite: bool,
    },
    /// Print the schema and leading rows of a dataset
    Show {
        name: String,
        /// Number of rows to print
        #[arg(short, long, default_value_t = 10)]
        rows: usize,
    },
    /// Print a JSON summary of a dataset
    Info { name: String },
    /// Delete a dataset
    Remove { name: String },
    /// Print usage examples
    Examples,
}

#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// Snapshot files in a local directory (default)
    File,
    /// Objects in an S3-compatible bucket
    Remote,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::File => write!(f, "file"),
            StorageKind::Remote => write!(f, "remote"),
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Reject flags that belong to the other backend.
    pub fn validate_for_storage(&self, storage: &StorageKind) -> Result<(), ConfigError> {
        match storage {
            StorageKind::File => {
                if self.s3_bucket.is_some() || self.s3_endpoint.is_some() || self.aws_region.is_some() {
                    return Err(ConfigError::Validation(
                        "--s3-bucket, --s3-endpoint and --aws-region require the remote backend"
                            .to_string(),
                    ));
                }
            }
            StorageKind::Remote => {
                if self.datasets_path.is_some() {
                    return Err(ConfigError::Validation(
                        "--datasets-path requires the file backend".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Print example usage for different backends
    pub fn print_examples() {
        println!("Examples:");
        println!("  # List datasets in ./datasets (default file backend)");
        println!("  {} list", env!("CARGO_PKG_NAME"));
        println!();

        println!("  # Store a CSV file under a new name");
        println!("  {} add sales.csv --name sales", env!("CARGO_PKG_NAME"));
        println!();

        println!("  # Use a bucket on a MinIO server");
        println!(
            "  DATABASE=minio AWS_ACCESS_KEY_ID=... AWS_SECRET_ACCESS_KEY=... {} --s3-endpoint http://localhost:9000 list",
            env!("CARGO_PKG_NAME")
        );
        println!();

        println!("  # Inspect and delete");
        println!("  {} show sales --rows 5", env!("CARGO_PKG_NAME"));
        println!("  {} remove sales", env!("CARGO_PKG_NAME"));
        println!();

        println!("  # Load from config file");
        println!("  {} --config config.json list", env!("CARGO_PKG_NAME"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let cli = Cli::parse_from(["coral-datasets", "add", "data.csv", "--name", "sales", "--overwrite"]);
        assert_eq!(
            cli.command,
            Command::Add {
                file: PathBuf::from("data.csv"),
                name: Some("sales".to_string()),
                overwrite: true,
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["coral-datasets", "list", "--storage", "remote", "-v"]);
        assert_eq!(cli.storage, Some(StorageKind::Remote));
        assert!(cli.verbose);
    }

    #[test]
    fn test_validate_conflicting_flags() {
        let cli = Cli::parse_from(["coral-datasets", "--s3-bucket", "b", "list"]);
        assert!(cli.validate_for_storage(&StorageKind::File).is_err());
        assert!(cli.validate_for_storage(&StorageKind::Remote).is_ok());

        let cli = Cli::parse_from(["coral-datasets", "--datasets-path", "/tmp/x", "list"]);
        assert!(cli.validate_for_storage(&StorageKind::Remote).is_err());
    }
}
