//! mssql-mapper CLI - run mapped queries against SQL Server from a YAML configuration.

use clap::{Parser, Subcommand};
use mssql_mapper::{
    Command, Config, MapperError, Mapper, Params, ProcedureKind, Record, Registry, Result,
};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mssql-mapper")]
#[command(about = "Metadata-driven object mapping for Microsoft SQL Server")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the database connection
    HealthCheck,

    /// List configured entities and stored procedures
    Entities,

    /// Print the statements generated for an entity
    Sql {
        /// Entity name
        entity: String,
    },

    /// Print every row of an entity's table
    All {
        /// Entity name
        entity: String,
    },

    /// Run SQL text or a stored procedure and print the rows
    Query {
        /// SQL text, or the procedure name with --procedure
        sql: String,

        /// Hydrate rows into this entity
        #[arg(long)]
        entity: Option<String>,

        /// Treat the text as a stored procedure name
        #[arg(long)]
        procedure: bool,

        /// Print rows as they are read instead of buffering the result
        #[arg(long)]
        stream: bool,
    },

    /// Insert one row from a JSON object
    Insert {
        /// Entity name
        entity: String,

        /// Row as a JSON object keyed by property
        #[arg(long)]
        json: String,
    },

    /// Execute a configured stored procedure
    Exec {
        /// Procedure name
        procedure: String,

        /// Parameter value, repeatable (NULL binds a NULL)
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MapperError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Entities => {
            let registry = offline_registry(&config)?;
            for name in registry.entity_names() {
                let mapping = registry.mapping(name)?;
                let def = mapping.definition();
                print_json(&serde_json::json!({
                    "entity": def.name,
                    "table": def.table,
                    "columns": def.columns.iter().map(|c| c.column.as_str()).collect::<Vec<_>>(),
                }));
            }
            for name in registry.procedure_names() {
                let def = registry.procedure(name)?;
                print_json(&serde_json::json!({
                    "procedure": def.name,
                    "kind": def.kind,
                    "params": def.params,
                }));
            }
        }

        Commands::Sql { entity } => {
            let registry = offline_registry(&config)?;
            println!("{}", registry.select_sql(&entity)?);
            println!("{}", registry.insert_sql(&entity)?);
        }

        Commands::HealthCheck => {
            let mapper = connect(&config).await?;
            let table = mapper.query_table(&Command::text("SELECT 1")).await?;
            info!("Health check passed ({} row)", table.len());
            print_json(&serde_json::json!({ "healthy": true }));
        }

        Commands::All { entity } => {
            let mapper = connect(&config).await?;
            for record in mapper.all_records(&entity).await? {
                print_json(&record.to_json());
            }
        }

        Commands::Query {
            sql,
            entity,
            procedure,
            stream,
        } => {
            let mapper = connect(&config).await?;
            let command = Command::new(sql, procedure);
            match (entity, stream) {
                (Some(entity), true) => {
                    let count = mapper
                        .query_records_each(&entity, &command, |record| {
                            print_json(&record.to_json());
                            Ok(())
                        })
                        .await?;
                    info!("Streamed {} rows", count);
                }
                (Some(entity), false) => {
                    for record in mapper.query_records(&entity, &command).await? {
                        print_json(&record.to_json());
                    }
                }
                (None, true) => {
                    let count = mapper
                        .query_rows_each(&command, |row| {
                            print_json(&row.to_json());
                            Ok(())
                        })
                        .await?;
                    info!("Streamed {} rows", count);
                }
                (None, false) => {
                    for row in mapper.query_table(&command).await? {
                        print_json(&row.to_json());
                    }
                }
            }
        }

        Commands::Insert { entity, json } => {
            let mapper = connect(&config).await?;
            let def = mapper.registry().mapping(&entity)?.definition();
            let value: JsonValue = serde_json::from_str(&json)?;
            let record = Record::from_json(def, &value)?;
            let affected = mapper.insert_record(&record).await?;
            print_json(&serde_json::json!({ "rows_affected": affected }));
        }

        Commands::Exec { procedure, params } => {
            let mapper = connect(&config).await?;
            let params = parse_params(&mapper, &procedure, &params)?;
            let entity = config.procedure(&procedure).and_then(|p| p.entity.clone());

            match mapper.registry().procedure(&procedure)?.kind {
                ProcedureKind::NonQuery => {
                    let affected = mapper
                        .execute_non_query_procedure(&procedure, Some(&params))
                        .await?;
                    print_json(&serde_json::json!({ "rows_affected": affected }));
                }
                ProcedureKind::Scalar => {
                    let value = mapper
                        .execute_scalar_value(&procedure, Some(&params))
                        .await?;
                    print_json(&value.to_json());
                }
                ProcedureKind::Rows => match entity {
                    Some(entity) => {
                        for record in mapper
                            .execute_procedure_records(&procedure, &entity, Some(&params))
                            .await?
                        {
                            print_json(&record.to_json());
                        }
                    }
                    None => {
                        let def = mapper.registry().procedure(&procedure)?;
                        let command = Command::for_procedure(def, Some(&params))?;
                        for row in mapper.query_table(&command).await? {
                            print_json(&row.to_json());
                        }
                    }
                },
            }
        }
    }

    Ok(())
}

/// Registry built from configuration without connecting.
fn offline_registry(config: &Config) -> Result<Registry> {
    let mut registry = Registry::new();
    registry.load_config(config)?;
    Ok(registry)
}

async fn connect(config: &Config) -> Result<Mapper> {
    if config.connection.is_none() {
        return Err(MapperError::NotConnected);
    }
    Mapper::from_config(config).await
}

/// Parse `NAME=VALUE` pairs using the procedure's declared parameter types.
fn parse_params(mapper: &Mapper, procedure: &str, raw: &[String]) -> Result<Params> {
    let def = mapper.registry().procedure(procedure)?;
    let mut params = Params::new();

    for pair in raw {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            MapperError::Config(format!("--param expects NAME=VALUE, got '{}'", pair))
        })?;
        let bare = name.trim().trim_start_matches('@');
        let declared = def
            .params
            .iter()
            .find(|p| p.name.trim_start_matches('@').eq_ignore_ascii_case(bare))
            .ok_or_else(|| {
                MapperError::Config(format!(
                    "procedure '{}' has no parameter named '{}'",
                    procedure, name
                ))
            })?;
        params.insert(declared.name.clone(), declared.db_type.parse_value(value)?);
    }

    Ok(params)
}

fn print_json(value: &JsonValue) {
    println!("{}", value);
}

fn setup_logging(verbosity: &str, format: &str) -> std::result::Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries the rows
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
