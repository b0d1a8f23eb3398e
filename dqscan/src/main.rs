//! Command-line front end for the dqscan warehouse dialects.
//!
//! Scaffolds warehouse configuration files, checks that a configured
//! warehouse accepts connections, and lists the tables a scan would see.
//!
//! # Security Guarantees
//! - Read-only warehouse operations only
//! - Credentials are read through `env_var(...)` or `secret_file(...)`
//!   indirections and never printed or logged

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dqscan_core::{
    Configuration, DialectRegistry, RetryPolicy, init_logging, open_with_retry, with_session,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// File name of the scaffolded warehouse configuration.
const WAREHOUSE_FILE: &str = "warehouse.json";

/// File name of the scaffolded environment variable placeholders.
const ENV_VARS_FILE: &str = "env_vars.json";

#[derive(Debug, Parser)]
#[command(name = "dqscan")]
#[command(about = "Data-quality scanner warehouse tool")]
#[command(version)]
#[command(long_about = "
dqscan - warehouse connectivity and introspection

Works with the warehouse configuration files read by the dqscan scanner:
- Scaffold a configuration template for a warehouse type
- Test that a configured warehouse accepts connections
- List the tables visible in the configured schema or dataset

SUPPORTED WAREHOUSES:
- PostgreSQL (type: postgres)
- BigQuery (type: bigquery)

EXAMPLES:
  dqscan create postgres --dir ./project
  dqscan test ./project/warehouse.json --attempts 5
  dqscan tables ./project/warehouse.json --filter 'order%' --limit 20
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a configuration template for a warehouse type
    Create(CreateArgs),
    /// Test the connection described by a configuration file
    Test(TestArgs),
    /// List tables in the configured schema or dataset
    Tables(TablesArgs),
    /// List supported warehouse types
    List,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Warehouse type tag
    #[arg(help = "Warehouse type (postgres, bigquery)")]
    pub warehouse_type: String,

    /// Output directory
    #[arg(long, default_value = ".", help = "Directory to write the templates into")]
    pub dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Warehouse configuration file
    #[arg(help = "Path to a warehouse.json file")]
    pub config: PathBuf,

    /// Connection attempts
    #[arg(
        long,
        default_value = "3",
        help = "Maximum connection attempts for transient failures"
    )]
    pub attempts: u32,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    /// Warehouse configuration file
    #[arg(help = "Path to a warehouse.json file")]
    pub config: PathBuf,

    /// Table name pattern
    #[arg(long, help = "SQL LIKE pattern matched against table names")]
    pub filter: Option<String>,

    /// Maximum number of tables
    #[arg(long, help = "Maximum number of tables to list")]
    pub limit: Option<u32>,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let registry = DialectRegistry::with_builtins();
    match &cli.command {
        Command::Create(args) => create_project(&registry, args).await,
        Command::Test(args) => test_connection(&registry, args).await,
        Command::Tables(args) => list_tables(&registry, args).await,
        Command::List => {
            list_warehouse_types(&registry);
            Ok(())
        }
    }
}

/// Reads and parses a warehouse configuration file.
async fn load_configuration(path: &Path) -> Result<Configuration> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = Configuration::from_json_str(&text)
        .with_context(|| format!("Invalid warehouse configuration in {}", path.display()))?;
    Ok(config)
}

/// Renders placeholder environment variables as a JSON object.
fn env_vars_json(env_vars: &[(String, String)]) -> Result<String> {
    let object: serde_json::Map<String, serde_json::Value> = env_vars
        .iter()
        .map(|(name, placeholder)| (name.clone(), placeholder.clone().into()))
        .collect();
    serde_json::to_string_pretty(&object).context("Failed to render environment variables")
}

/// Writes the configuration template and its environment variable placeholders.
async fn create_project(registry: &DialectRegistry, args: &CreateArgs) -> Result<()> {
    let template = registry.template(&args.warehouse_type)?;
    let env_vars = registry.env_var_template(&args.warehouse_type)?;

    tokio::fs::create_dir_all(&args.dir)
        .await
        .with_context(|| format!("Failed to create {}", args.dir.display()))?;

    let warehouse_path = args.dir.join(WAREHOUSE_FILE);
    tokio::fs::write(&warehouse_path, template.to_json_pretty()?)
        .await
        .with_context(|| format!("Failed to write {}", warehouse_path.display()))?;
    info!("✓ Wrote {}", warehouse_path.display());

    let env_path = args.dir.join(ENV_VARS_FILE);
    tokio::fs::write(&env_path, env_vars_json(&env_vars)?)
        .await
        .with_context(|| format!("Failed to write {}", env_path.display()))?;
    info!("✓ Wrote {}", env_path.display());

    println!(
        "Created {} configuration in {}",
        args.warehouse_type,
        args.dir.display()
    );
    Ok(())
}

/// Tests the warehouse connection without running any scan query.
async fn test_connection(registry: &DialectRegistry, args: &TestArgs) -> Result<()> {
    info!("Testing warehouse connection...");

    let config = load_configuration(&args.config).await?;
    let dialect = registry.create(&config)?;
    info!("Created {} dialect", dialect.warehouse_type());

    let policy = RetryPolicy::default().with_max_attempts(args.attempts);
    let session = open_with_retry(dialect.as_ref(), &policy)
        .await
        .inspect_err(|e| {
            error!("Connection test failed: {}", e);
            if let Some(classification) = e.classification() {
                eprintln!("Failure classified as: {}", classification);
            }
        })?;
    session.close().await?;

    info!("✓ Connection test successful");
    println!(
        "Connection to {} warehouse successful",
        dialect.warehouse_type()
    );
    Ok(())
}

/// Lists table names visible in the configured schema or dataset.
async fn list_tables(registry: &DialectRegistry, args: &TablesArgs) -> Result<()> {
    let config = load_configuration(&args.config).await?;
    let dialect = registry.create(&config)?;

    let sql = dialect.tables_metadata_query(args.limit, args.filter.as_deref());
    let result = with_session(dialect.as_ref(), |session| {
        Box::pin(async move { session.query(&sql).await })
    })
    .await?;

    let mut count = 0usize;
    for value in result.column_values("table_name") {
        match value.as_str() {
            Some(name) => println!("{}", name),
            None => println!("{}", value),
        }
        count = count.saturating_add(1);
    }
    info!("Found {} tables", count);
    Ok(())
}

/// Prints the warehouse types this build can connect to.
fn list_warehouse_types(registry: &DialectRegistry) {
    println!("Supported warehouse types:");
    for warehouse in registry.warehouse_types() {
        println!("  {}", warehouse);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_defaults() {
        let cli = Cli::try_parse_from(["dqscan", "create", "postgres"]).unwrap();
        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.warehouse_type, "postgres");
                assert_eq!(args.dir, PathBuf::from("."));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.global.verbose, 0);
        assert!(!cli.global.quiet);
    }

    #[test]
    fn test_parse_tables_options_and_global_flags() {
        let cli = Cli::try_parse_from([
            "dqscan",
            "tables",
            "warehouse.json",
            "--filter",
            "order%",
            "--limit",
            "20",
            "-vv",
        ])
        .unwrap();
        match cli.command {
            Command::Tables(args) => {
                assert_eq!(args.config, PathBuf::from("warehouse.json"));
                assert_eq!(args.filter.as_deref(), Some("order%"));
                assert_eq!(args.limit, Some(20));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.global.verbose, 2);
    }

    #[test]
    fn test_parse_test_attempts() {
        let cli = Cli::try_parse_from(["dqscan", "-q", "test", "w.json", "--attempts", "5"]).unwrap();
        match cli.command {
            Command::Test(args) => assert_eq!(args.attempts, 5),
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(cli.global.quiet);
    }

    #[test]
    fn test_parse_rejects_missing_command() {
        assert!(Cli::try_parse_from(["dqscan"]).is_err());
        assert!(Cli::try_parse_from(["dqscan", "tables"]).is_err());
    }

    #[test]
    fn test_env_vars_json() {
        let json = env_vars_json(&[("POSTGRES_USERNAME".to_string(), "Eg johndoe".to_string())])
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["POSTGRES_USERNAME"], "Eg johndoe");
        assert_eq!(env_vars_json(&[]).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_create_project_writes_templates() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("project");
        let args = CreateArgs {
            warehouse_type: "postgres".to_string(),
            dir: target.clone(),
        };

        create_project(&DialectRegistry::with_builtins(), &args)
            .await
            .unwrap();

        let config = load_configuration(&target.join(WAREHOUSE_FILE)).await.unwrap();
        assert_eq!(config.warehouse_type().unwrap(), "postgres");

        let env_text = std::fs::read_to_string(target.join(ENV_VARS_FILE)).unwrap();
        let env: serde_json::Value = serde_json::from_str(&env_text).unwrap();
        assert!(env.get("POSTGRES_PASSWORD").is_some());
    }

    #[tokio::test]
    async fn test_create_project_rejects_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let args = CreateArgs {
            warehouse_type: "oracle".to_string(),
            dir: dir.path().to_path_buf(),
        };

        let error = create_project(&DialectRegistry::with_builtins(), &args)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("oracle"));
        assert!(!dir.path().join(WAREHOUSE_FILE).exists());
    }

    #[tokio::test]
    async fn test_load_configuration_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let error = load_configuration(&path).await.unwrap_err();
        assert!(error.to_string().contains("missing.json"));
    }
}
