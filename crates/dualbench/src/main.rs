//! dualbench CLI - PostgreSQL vs MongoDB explain-plan benchmark.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dualbench::indexes::run_index_setup;
use dualbench::scenario::scenarios_to_yaml;
use dualbench::{
    default_scenarios, load_scenarios, run_benchmark, BenchConfig, ConfigOverrides, DocumentQuery,
    Scenario,
};

/// Compare PostgreSQL and MongoDB query timings from their own explain output.
#[derive(Parser, Debug)]
#[command(name = "dualbench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every scenario on both engines and print the timings
    Run {
        #[command(flatten)]
        targets: TargetArgs,

        /// YAML scenario file (defaults to the built-in capture scenarios)
        #[arg(short, long, env = "DUALBENCH_SCENARIOS")]
        scenarios: Option<PathBuf>,
    },

    /// Print the scenario table
    List {
        /// YAML scenario file (defaults to the built-in capture scenarios)
        #[arg(short, long, env = "DUALBENCH_SCENARIOS")]
        scenarios: Option<PathBuf>,

        /// Print the scenarios in the YAML file format
        #[arg(long)]
        yaml: bool,
    },

    /// Create the configured indexes on the MongoDB collection
    Indexes {
        #[command(flatten)]
        targets: TargetArgs,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Connection targets: config file plus per-field overrides.
#[derive(Args, Debug)]
struct TargetArgs {
    /// YAML configuration file
    #[arg(short, long, env = "DUALBENCH_CONFIG")]
    config: Option<PathBuf>,

    /// PostgreSQL host
    #[arg(long, env = "DUALBENCH_PG_HOST")]
    pg_host: Option<String>,

    /// PostgreSQL port
    #[arg(long, env = "DUALBENCH_PG_PORT")]
    pg_port: Option<u16>,

    /// PostgreSQL database
    #[arg(long, env = "DUALBENCH_PG_DATABASE")]
    pg_database: Option<String>,

    /// PostgreSQL user
    #[arg(long, env = "DUALBENCH_PG_USER")]
    pg_user: Option<String>,

    /// PostgreSQL password
    #[arg(long, env = "DUALBENCH_PG_PASSWORD", hide_env_values = true)]
    pg_password: Option<String>,

    /// MongoDB connection URI
    #[arg(long, env = "DUALBENCH_MONGO_URI", hide_env_values = true)]
    mongo_uri: Option<String>,

    /// MongoDB database
    #[arg(long, env = "DUALBENCH_MONGO_DATABASE")]
    mongo_database: Option<String>,

    /// MongoDB collection
    #[arg(long, env = "DUALBENCH_MONGO_COLLECTION")]
    mongo_collection: Option<String>,
}

impl TargetArgs {
    fn into_config(self) -> anyhow::Result<BenchConfig> {
        let base = match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                BenchConfig::from_file(path)?
            }
            None => BenchConfig::default(),
        };

        let config = base.with_overrides(ConfigOverrides {
            pg_host: self.pg_host,
            pg_port: self.pg_port,
            pg_database: self.pg_database,
            pg_user: self.pg_user,
            pg_password: self.pg_password,
            mongo_uri: self.mongo_uri,
            mongo_database: self.mongo_database,
            mongo_collection: self.mongo_collection,
        });
        config.validate()?;
        tracing::debug!("Effective configuration: {:?}", config);
        Ok(config)
    }
}

fn scenarios_from(path: Option<&PathBuf>) -> anyhow::Result<Vec<Scenario>> {
    match path {
        Some(path) => {
            tracing::info!("Loading scenarios from {}", path.display());
            Ok(load_scenarios(path)?)
        }
        None => Ok(default_scenarios()),
    }
}

fn print_scenarios(scenarios: &[Scenario]) {
    for scenario in scenarios {
        println!("{} [{}]", scenario.name, scenario.mode());
        println!("   SQL   : {}", scenario.sql.trim());
        match &scenario.document {
            DocumentQuery::Find { filter } => {
                println!("   MONGO : {}", serde_json::Value::Object(filter.clone()));
            }
            DocumentQuery::Aggregate { pipeline } => {
                println!("   MONGO : {}", serde_json::Value::Array(pipeline.clone()));
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run { targets, scenarios } => {
            let config = targets.into_config()?;
            let scenarios = scenarios_from(scenarios.as_ref())?;
            run_benchmark(&config, scenarios).await;
        }
        Command::List { scenarios, yaml } => {
            let scenarios = scenarios_from(scenarios.as_ref())?;
            if yaml {
                print!("{}", scenarios_to_yaml(&scenarios)?);
            } else {
                print_scenarios(&scenarios);
            }
        }
        Command::Indexes { targets } => {
            let config = targets.into_config()?;
            let mut stdout = std::io::stdout();
            let failed = run_index_setup(&config, &mut stdout).await;
            if failed > 0 {
                anyhow::bail!("{failed} index(es) could not be created");
            }
        }
        Command::InitConfig { output } => {
            let yaml = BenchConfig::default().to_yaml()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, yaml)?;
                    tracing::info!("Configuration written to {}", path.display());
                }
                None => print!("{yaml}"),
            }
        }
    }

    Ok(())
}
