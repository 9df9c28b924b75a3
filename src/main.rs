//! Porta CLI Entry Point
//!
//! Subcommands:
//! - `serve` - MCP server over stdio (for AI agent integration)
//! - `tables` - list accessible tables
//! - `describe <table>` - column schema and row count
//! - `policy` - print the resolved access policy
//!
//! Connection parameters and policy flags come from the environment (see
//! `config`); the flags below are the override layer. Logs go to stderr.

use clap::{Parser, Subcommand};

use porta::{
    audit, config, AuditLog, DbService, McpServer, MySqlExecutor, OperationOutput,
    OperationRequest, Overrides,
};

/// Porta - Least-privilege MySQL tool server for AI agents
#[derive(Parser)]
#[command(name = "porta")]
#[command(about = "Least-privilege MySQL tool server for AI agents (MCP)")]
#[command(version)]
struct Cli {
    /// Database host (overrides MYSQL_HOST)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Database port (overrides MYSQL_PORT)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Database user (overrides MYSQL_USER)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Database name (overrides MYSQL_DATABASE)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Force read-only mode regardless of environment flags
    #[arg(long, global = true)]
    read_only: bool,

    /// Row ceiling for select results (overrides PORTA_MAX_ROWS)
    #[arg(long, global = true)]
    max_rows: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server on stdio
    Serve,

    /// List accessible tables
    Tables,

    /// Describe one table (columns and row count)
    Describe {
        /// Table name
        table: String,
    },

    /// Print the resolved access policy as JSON
    Policy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    audit::init_tracing()?;

    let cli = Cli::parse();
    let overrides = Overrides {
        host: cli.host.clone(),
        port: cli.port,
        user: cli.user.clone(),
        database: cli.database.clone(),
        read_only: cli.read_only,
        max_rows: cli.max_rows,
    };
    let settings = config::resolve(&overrides)?;

    if let Commands::Policy = cli.command {
        println!("{}", serde_json::to_string_pretty(&settings.policy)?);
        return Ok(());
    }

    let executor = MySqlExecutor::new(&settings.connection);
    let service = DbService::new(settings.policy.clone(), executor.clone(), AuditLog::new());

    match cli.command {
        Commands::Serve => {
            let info = executor.probe().await?;
            tracing::info!(
                server = %info.server,
                database = %settings.connection.database,
                "Starting porta MCP server"
            );

            McpServer::new(service).serve().await?;

            tracing::info!("Server shutting down");
            executor.disconnect().await?;
        }

        Commands::Tables => {
            let output = service.run(OperationRequest::ListTables).await?;
            let OperationOutput::Tables(list) = output else {
                anyhow::bail!("unexpected output shape for list_tables");
            };
            let rows: Vec<Vec<serde_json::Value>> = list
                .tables
                .iter()
                .map(|t| vec![serde_json::Value::String(t.clone())])
                .collect();
            print!("{}", porta::render_table(&["Tables".to_string()], &rows));
            println!("{} tables ({} ms)", list.tables.len(), list.elapsed_ms);
        }

        Commands::Describe { table } => {
            let output = service.run(OperationRequest::DescribeTable { table }).await?;
            let OperationOutput::Description(desc) = output else {
                anyhow::bail!("unexpected output shape for describe_table");
            };
            let columns: Vec<String> =
                ["Column", "Type", "Nullable", "Key", "Default", "Extra"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
            let rows: Vec<Vec<serde_json::Value>> = desc
                .columns
                .iter()
                .map(|c| {
                    vec![
                        serde_json::Value::String(c.name.clone()),
                        serde_json::Value::String(c.data_type.clone()),
                        serde_json::Value::String((if c.nullable { "YES" } else { "NO" }).to_string()),
                        serde_json::Value::String(c.key.clone()),
                        c.default.clone().map_or(serde_json::Value::Null, serde_json::Value::String),
                        serde_json::Value::String(c.extra.clone()),
                    ]
                })
                .collect();
            print!("{}", porta::render_table(&columns, &rows));
            println!("{}: {} rows ({} ms)", desc.table, desc.total_rows, desc.elapsed_ms);
        }

        Commands::Policy => unreachable!("handled before connecting"),
    }

    Ok(())
}
