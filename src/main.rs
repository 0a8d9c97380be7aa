use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use delimited_rdf_converter::{
    config::Configuration,
    core::{CancellationFlag, ConversionRequest, RdfConverter, UuidSource},
};

#[derive(Parser)]
#[command(
    name = "delimited_rdf_converter",
    about = "Convert pipe-delimited data files into CIDOC-CRM RDF (Turtle)",
    long_about = None,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (YAML or JSON); built-in defaults otherwise
    #[arg(short, long, global = true, env = "DELIMITED_RDF_CONFIG")]
    config: Option<PathBuf>,

    /// Override the delimited data root
    #[arg(long, global = true, env = "DELIMITED_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Override the RDF output root
    #[arg(long, global = true, env = "RDF_DATA_DIR")]
    rdf_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the column names of a delimited file
    Columns {
        /// File name inside the delimited data root
        #[arg(short, long)]
        file: String,

        /// Print the columns as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Convert a delimited file into a Turtle file
    Convert {
        /// File name inside the delimited data root
        #[arg(short, long)]
        file: String,

        /// Column holding a unique row identifier (random ids when omitted)
        #[arg(long)]
        id_column: Option<String>,

        /// Column holding the row label
        #[arg(long)]
        label_column: String,

        /// Columns to convert; every column when none are given
        #[arg(short, long, num_args = 1..)]
        mapped: Vec<String>,

        /// Abort the conversion after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Also write the Turtle to stdout
        #[arg(long)]
        stdout: bool,

        /// Print the conversion report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short = 'p', long)]
        path: PathBuf,
    },

    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration format (yaml or json)
        #[arg(short, long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

#[derive(clap::ValueEnum, Clone)]
enum ConfigFormat {
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { command, config, data_dir, rdf_dir, verbose, debug } = Cli::parse();

    // Setup logging; RUST_LOG wins over the flags
    let log_level = if debug {
        tracing::Level::DEBUG
    } else if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let sources = ConfigSources { config, data_dir, rdf_dir };

    match command {
        Commands::Columns { file, json } => {
            columns_command(sources.load()?, file, json).await
        }
        Commands::Convert {
            file,
            id_column,
            label_column,
            mapped,
            timeout,
            stdout,
            json,
        } => {
            let mut config = sources.load()?;
            if timeout.is_some() {
                config.timeout_secs = timeout;
            }
            let request = ConversionRequest {
                data_file_name: file,
                unique_id_column: id_column,
                unique_id_label_column: label_column,
                mapped_columns: mapped,
            };
            convert_command(config, request, stdout, json).await
        }
        Commands::Validate { path } => validate_command(path).await,
        Commands::GenerateConfig { output, format } => {
            generate_config_command(output, format).await
        }
    }
}

struct ConfigSources {
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    rdf_dir: Option<PathBuf>,
}

impl ConfigSources {
    fn load(self) -> Result<Configuration> {
        let mut config = match &self.config {
            Some(path) => Configuration::from_file(path)?,
            None => Configuration::default(),
        };

        if let Some(dir) = self.data_dir {
            config.delimited_data_dir = dir;
        }
        if let Some(dir) = self.rdf_dir {
            config.rdf_data_dir = dir;
        }

        config.validate()?;
        Ok(config)
    }
}

async fn columns_command(config: Configuration, file: String, json: bool) -> Result<()> {
    let converter = RdfConverter::new(config);
    let columns = tokio::task::spawn_blocking(move || converter.file_columns(&file))
        .await?
        .context("Failed to read column names")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&columns)?);
    } else {
        for column in columns {
            println!("{}", column);
        }
    }

    Ok(())
}

async fn convert_command(
    config: Configuration,
    mut request: ConversionRequest,
    stdout: bool,
    json: bool,
) -> Result<()> {
    if !json {
        eprintln!("{}", "Starting RDF conversion...".bright_blue().bold());
    }

    let converter = RdfConverter::new(config);

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let output = tokio::task::spawn_blocking(move || {
        // The upload form maps every column when nothing is selected
        if request.mapped_columns.is_empty() {
            request.mapped_columns = converter.file_columns(&request.data_file_name)?;
            info!("No mapped columns given, mapping all {}", request.mapped_columns.len());
        }
        converter.create_rdf_file_with(&request, &mut UuidSource, &cancel)
    })
    .await?;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            error!("Conversion failed ({:?}): {}", e.kind(), e);
            return Err(e).context("RDF conversion failed");
        }
    };

    if stdout {
        std::io::stdout().write_all(&output.turtle)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&output.report)?);
        return Ok(());
    }

    let report = &output.report;
    eprintln!("\n{}", " Conversion Summary".bright_green().bold());
    eprintln!(" Rows converted: {}", report.rows.to_string().bright_cyan());
    eprintln!(" Entities: {}", report.entities.to_string().bright_cyan());
    eprintln!(" Appellations: {} ({} reused)", report.appellations, report.cache_hits);
    eprintln!(" Total triples: {}", report.triples.to_string().bright_cyan());
    eprintln!(" Processing time: {:.2}s", report.processing_time_seconds);
    eprintln!(" Turtle written to: {}", output.output_path.display().to_string().bright_green());

    Ok(())
}

async fn validate_command(config_path: PathBuf) -> Result<()> {
    println!("{}", " Validating configuration...".bright_blue().bold());

    match Configuration::from_file(&config_path) {
        Ok(config) => {
            match config.validate() {
                Ok(()) => {
                    println!(" Configuration is valid!");
                    println!(" Delimited data: {}", config.delimited_data_dir.display());
                    println!(" RDF data: {}", config.rdf_data_dir.display());
                    println!(" Namespace: {}", config.resource_namespace.bright_green());
                    println!(" CIDOC-CRM: {}", config.vocabulary.crm_namespace);
                    Ok(())
                }
                Err(e) => {
                    error!(" Configuration validation failed: {}", e);
                    Err(e)
                }
            }
        }
        Err(e) => {
            error!(" Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

async fn generate_config_command(output_path: PathBuf, format: ConfigFormat) -> Result<()> {
    println!("{}", " Generating example configuration...".bright_blue().bold());

    let config = Configuration::example();

    let content = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };

    tokio::fs::write(&output_path, content).await?;

    println!(" Example configuration generated at: {}", output_path.display().to_string().bright_green());
    println!(" Edit the file to customize for your use case");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> Configuration {
        Configuration {
            delimited_data_dir: dir.path().join("delimited"),
            rdf_data_dir: dir.path().join("rdf"),
            ..Configuration::default()
        }
    }

    #[tokio::test]
    async fn test_convert_maps_every_column_when_none_selected() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        std::fs::create_dir_all(&config.delimited_data_dir).unwrap();
        std::fs::write(
            config.delimited_data_dir.join("objects.csv"),
            "ID|Term|Category\n1|Vase|Pottery\n",
        )
        .unwrap();
        let output_path = RdfConverter::new(config.clone()).output_path("objects.csv").unwrap();

        let request = ConversionRequest {
            data_file_name: "objects.csv".to_string(),
            unique_id_column: Some("ID".to_string()),
            unique_id_label_column: "Term".to_string(),
            mapped_columns: Vec::new(),
        };
        convert_command(config, request, false, true).await.unwrap();

        let turtle = std::fs::read_to_string(output_path).unwrap();
        assert!(turtle.contains("/term/category/"));
        assert!(turtle.contains("\"Pottery\""));
        assert!(turtle.contains("\"Vase\""));
    }

    #[tokio::test]
    async fn test_convert_reports_missing_file_when_none_selected() {
        let dir = tempfile::tempdir().unwrap();
        let request = ConversionRequest {
            data_file_name: "absent.csv".to_string(),
            unique_id_label_column: "Term".to_string(),
            ..ConversionRequest::default()
        };

        assert!(convert_command(config_in(&dir), request, false, true).await.is_err());
    }
}
