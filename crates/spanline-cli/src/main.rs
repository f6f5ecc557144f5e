use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spanline_core::{Config, Location, QuerySpan, Severity, SpanReport};
use spanline_catalog::InMemoryCatalog;
use spanline_sql::{QuerySpanExtractor, SqlParser};

/// spanline - column-level lineage for PostgreSQL statements
#[derive(Parser)]
#[command(name = "spanline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: spanline.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the span of one SQL statement
    Span {
        /// SQL text (reads --file when omitted)
        sql: Option<String>,

        /// Read the statement from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Catalog snapshot JSON (default: catalog.path from config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Database for unqualified names
        #[arg(short, long)]
        database: Option<String>,

        /// Comma-separated schema search path
        #[arg(long, value_delimiter = ',')]
        search_path: Option<Vec<String>>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Summarize a catalog snapshot
    Catalog {
        /// Catalog snapshot JSON (default: catalog.path from config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Write a default spanline.toml
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Snapshot a live PostgreSQL catalog to JSON
    #[cfg(feature = "postgres")]
    SyncCatalog {
        /// Connection string (default: catalog.connection or SPANLINE_PG_URL)
        #[arg(long)]
        connection: Option<String>,

        /// Connect over TLS
        #[arg(long)]
        tls: bool,

        /// Output file for the snapshot
        #[arg(short, long, default_value = "catalog.json")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    // The file init-config writes need not exist yet
    if let Commands::InitConfig { force } = cli.command {
        return init_config_command(cli.config.as_deref(), force);
    }
    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Span {
            sql,
            file,
            catalog,
            database,
            search_path,
            format,
        } => {
            let input = SpanInput {
                sql,
                file,
                catalog,
                database,
                search_path,
            };
            span_command(&config, input, format, cli.verbose)
        }
        Commands::Catalog { catalog } => catalog_command(&config, catalog.as_deref()),
        Commands::InitConfig { .. } => Ok(()),
        #[cfg(feature = "postgres")]
        Commands::SyncCatalog {
            connection,
            tls,
            output,
        } => sync_catalog_command(&config, connection, tls, &output, cli.verbose).await,
    }
}

/// Log to stderr; RUST_LOG overrides the level chosen by `-v`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)?
    } else if Path::new("spanline.toml").exists() {
        Config::from_file(Path::new("spanline.toml"))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if verbose {
        eprintln!(
            "{} database {}, search path {}",
            "Using".cyan(),
            config.analysis.default_database,
            config.analysis.search_path.join(",")
        );
    }
    Ok(config)
}

fn load_catalog(config: &Config, path: Option<&Path>) -> Result<InMemoryCatalog> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| config.catalog_path())
        .ok_or_else(|| anyhow::anyhow!("No catalog given. Pass --catalog or set catalog.path in spanline.toml"))?;

    InMemoryCatalog::from_file(&path)
        .with_context(|| format!("Failed to load catalog from {}", path.display()))
}

struct SpanInput {
    sql: Option<String>,
    file: Option<PathBuf>,
    catalog: Option<PathBuf>,
    database: Option<String>,
    search_path: Option<Vec<String>>,
}

/// Span command - analyze one statement
fn span_command(config: &Config, input: SpanInput, format: OutputFormat, verbose: bool) -> Result<()> {
    let parser = SqlParser::new();
    let (parsed, location) = match (input.sql, &input.file) {
        (Some(sql), None) => (parser.parse(&sql, None), None),
        (None, Some(file)) => (
            parser.parse_file(file),
            Some(Location::new(file.display().to_string())),
        ),
        (Some(_), Some(_)) => return Err(anyhow::anyhow!("Pass either SQL text or --file, not both")),
        (None, None) => return Err(anyhow::anyhow!("No statement given. Pass SQL text or --file")),
    };
    let parsed = parsed.map_err(|e| {
        let diag = e.to_diagnostic();
        anyhow::anyhow!("[{}] {}", diag.code, diag.message)
    })?;

    let catalog = load_catalog(config, input.catalog.as_deref())?;

    let mut analysis = config.analysis.clone();
    if let Some(database) = input.database {
        analysis.default_database = database;
    }
    if let Some(search_path) = input.search_path {
        analysis.search_path = search_path;
    }

    if verbose {
        eprintln!("{} {}", "Analyzing against database".cyan(), analysis.default_database);
    }

    let extractor = QuerySpanExtractor::from_config(&catalog, &analysis);
    let span = extractor
        .get_parsed_span(&parsed)
        .map_err(|e| anyhow::anyhow!("[{}] {}", e.code(), e))?;

    let report = SpanReport::from_span(analysis.default_database, span, location);
    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print_span_report(&report),
    }

    Ok(())
}

/// Catalog command - summarize a snapshot
fn catalog_command(config: &Config, path: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(config, path)?;

    let mut names = catalog.database_names();
    names.sort();
    for name in names {
        let Some(database) = catalog.database(&name) else {
            continue;
        };
        println!("{} {}", "Database".bold(), name.bright_blue());
        for schema in &database.schemas {
            println!(
                "  {:<24} {} tables, {} views, {} materialized views, {} sequences, {} external tables, {} functions",
                schema.name,
                schema.tables.len(),
                schema.views.len(),
                schema.materialized_views.len(),
                schema.sequences.len(),
                schema.external_tables.len(),
                schema.functions.len(),
            );
        }
    }

    Ok(())
}

/// Init-config command - write the default configuration
fn init_config_command(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(|| Path::new("spanline.toml"));
    if path.exists() && !force {
        return Err(anyhow::anyhow!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        ));
    }

    Config::default().save_to_file(path)?;
    println!("{} {}", "Wrote".green(), path.display());
    Ok(())
}

/// Sync-catalog command - snapshot a live database
#[cfg(feature = "postgres")]
async fn sync_catalog_command(
    config: &Config,
    connection: Option<String>,
    tls: bool,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    use spanline_catalog::PostgresCatalogLoader;

    let connection = connection
        .or_else(|| config.catalog.connection.clone())
        .or_else(|| std::env::var("SPANLINE_PG_URL").ok())
        .ok_or_else(|| {
            anyhow::anyhow!("No connection string. Pass --connection, set catalog.connection or SPANLINE_PG_URL")
        })?;

    if verbose {
        eprintln!("{}", "Connecting to PostgreSQL...".cyan());
    }

    let loader = if tls || config.catalog.tls {
        PostgresCatalogLoader::from_connection_string_with_tls(&connection).await?
    } else {
        PostgresCatalogLoader::from_connection_string(&connection).await?
    };

    let snapshot = loader.load().await?;
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(output, json).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} {} ({} schemas) to {}",
        "Saved snapshot of".green(),
        loader.database(),
        snapshot.schemas.len(),
        output.display()
    );
    Ok(())
}

/// Print a span report to stdout
fn print_span_report(report: &SpanReport) {
    let span = &report.span;

    println!("{}", "=".repeat(60).bright_blue());
    println!("{} ({:?})", "Query Span".bold().bright_blue(), span.kind);
    println!("{}", "=".repeat(60).bright_blue());

    if span.explain_analyze {
        println!("{}", "EXPLAIN ANALYZE: results omitted".yellow());
    }

    if !span.results.is_empty() {
        println!();
        println!("{}", "Results:".bold());
        for (index, column) in span.results.iter().enumerate() {
            println!("  {:>3}. {} <- {}", index + 1, column.name.bold(), format_sources(span, index));
        }
    }

    println!();
    println!("{}", "Reads:".bold());
    if span.source_columns.is_empty() {
        println!("  (none)");
    }
    for column in span.source_columns.iter() {
        if column.is_whole_database() {
            println!("  {} {}", "*".red().bold(), format!("{} (whole database)", column.database).red());
        } else {
            println!("  {}", column);
        }
    }

    for diag in &report.diagnostics {
        let severity_str = match diag.severity {
            Severity::Error => "ERROR".red().bold(),
            Severity::Warn => "WARN".yellow().bold(),
            Severity::Info => "INFO".cyan(),
        };
        println!();
        println!("[{}] {}: {}", severity_str, diag.code, diag.message);
    }
}

fn format_sources(span: &QuerySpan, index: usize) -> String {
    let sources = &span.results[index].sources;
    if sources.is_empty() {
        return "(none)".dimmed().to_string();
    }
    sources
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
