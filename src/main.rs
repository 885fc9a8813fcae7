//! ax CLI
//!
//! Command-line interface for querying and tailing logs:
//! - Query records across time-partitioned indices
//! - Follow new records as they arrive
//! - List the index patterns of an environment
//! - Generate a default config file

use anyhow::Context;
use ax::backend::{Backend, KibanaBackend, KibanaConfig};
use ax::config::{self, Config, ConfigOverrides, LoggingConfig, RuntimeConfig};
use ax::index::{open_index_cache, open_pattern_cache};
use ax::output::{self, OutputFormat};
use ax::query::{
    build_filters, parse_max_results, parse_time, Follower, QueryError, QueryExecutor, QuerySpec,
    ScanPolicy, DEFAULT_MAX_RESULTS,
};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "ax")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query and tail logs in time-partitioned Kibana/Elasticsearch indices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Environment to connect to
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Kibana URL to connect to
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Index pattern to query
    #[arg(long, global = true)]
    pub index: Option<String>,

    /// Config file (default: <config dir>/ax/ax.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query logs
    Query(QueryArgs),

    /// List the index patterns of the environment
    ListIndex {
        /// Ignore the cached list
        #[arg(long)]
        refresh: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct QueryArgs {
    /// Query string
    pub query: Vec<String>,

    /// Results from after. Supports: "now", "15m", "now-2h", RFC 3339, "YYYY-MM-DD", Unix timestamp
    #[arg(long)]
    pub after: Option<String>,

    /// Results from before
    #[arg(long)]
    pub before: Option<String>,

    /// Maximum number of results
    #[arg(
        short = 'n',
        long = "results",
        default_value_t = DEFAULT_MAX_RESULTS,
        value_parser = parse_max_results
    )]
    pub results: usize,

    /// Fields to select
    #[arg(short, long)]
    pub select: Vec<String>,

    /// Add a filter (field:value)
    #[arg(short, long = "where")]
    pub wheres: Vec<String>,

    /// Sort results reverse-chronologically
    #[arg(long)]
    pub desc: bool,

    /// Fetch the oldest matching records instead of the newest
    #[arg(long)]
    pub oldest: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub output: OutputFormat,

    /// Follow log in quasi-realtime, similar to tail -f
    #[arg(short, long, conflicts_with_all = ["count_distinct", "before"])]
    pub follow: bool,

    /// Count identical records (ignoring @timestamp)
    #[arg(long)]
    pub count_distinct: bool,

    /// Rediscover indices even if the cached list is fresh
    #[arg(long)]
    pub refresh_indices: bool,

    /// Keep going when a single index fails
    #[arg(long)]
    pub skip_failed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_deref());
    }

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let file_config = Config::load(&config_path)?;
    init_logging(&file_config.logging);

    let flags = ConfigOverrides {
        env: cli.env.clone(),
        url: cli.url.clone(),
        auth_header: None,
        index: cli.index.clone(),
    };
    let runtime = RuntimeConfig::resolve(
        &file_config,
        ConfigOverrides::from_env(),
        flags,
        config::data_dir(),
    )?;
    tracing::debug!(?runtime.environment, url = %runtime.url, "Resolved configuration");

    config::ensure_data_dir(&runtime.data_dir)?;
    let backend = connect(&runtime).await?;

    match cli.command {
        Commands::Query(args) => query(&runtime, backend, args).await,
        Commands::ListIndex { refresh } => list_index(&runtime, backend, refresh).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// Logs go to stderr; stdout carries only records
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

async fn connect(runtime: &RuntimeConfig) -> anyhow::Result<Arc<dyn Backend>> {
    let mut backend = KibanaBackend::new(KibanaConfig {
        base_url: runtime.url.clone(),
        auth_header: runtime.auth_header.clone(),
        kibana_version: runtime.kibana_version.clone(),
        ..KibanaConfig::default()
    })?;
    backend.detect_version().await;
    Ok(Arc::new(backend))
}

fn build_spec(args: &QueryArgs) -> anyhow::Result<QuerySpec> {
    let mut spec = QuerySpec::new(args.query.join(" "))
        .limit(args.results)
        .select(args.select.iter().cloned())
        .descending(args.desc)
        .follow(args.follow);

    for filter in build_filters(&args.wheres)? {
        spec = spec.filter(filter);
    }
    if let Some(after) = &args.after {
        spec = spec.after(parse_time(after)?);
    }
    if let Some(before) = &args.before {
        spec = spec.before(parse_time(before)?);
    }
    spec.query_ascending = args.oldest;

    Ok(spec)
}

async fn query(runtime: &RuntimeConfig, backend: Arc<dyn Backend>, args: QueryArgs) -> anyhow::Result<()> {
    let pattern = runtime.require_index()?;
    let spec = build_spec(&args)?;
    let policy = if args.skip_failed {
        ScanPolicy::SkipFailedIndices
    } else {
        ScanPolicy::AbortOnError
    };

    let mut cache = open_index_cache(&runtime.data_dir, &runtime.url, pattern, backend.clone());
    let executor = QueryExecutor::new(backend).policy(policy);
    let format = args.output;

    if spec.follow {
        // Discovery happens inside the loop so startup failures are retried
        let mut follower =
            Follower::new(cache, executor, spec).refresh_indices(args.refresh_indices);
        let stdout = io::stdout();
        let never = follower
            .run(move |record| {
                let mut out = stdout.lock();
                output::write_record(&mut out, record, format)?;
                out.flush()
            })
            .await?;
        match never {}
    }

    let indices = cache.get(args.refresh_indices).await?;
    if indices.is_empty() {
        return Err(QueryError::NoIndices(pattern.to_string()).into());
    }

    let records = executor.run(&indices, &spec).await?;
    tracing::info!(count = records.len(), "Query complete");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.count_distinct {
        output::write_counts(&mut out, &output::count_distinct(&records))?;
    } else {
        for record in &records {
            output::write_record(&mut out, record, format)?;
        }
    }
    out.flush()?;

    Ok(())
}

async fn list_index(runtime: &RuntimeConfig, backend: Arc<dyn Backend>, refresh: bool) -> anyhow::Result<()> {
    let mut cache = open_pattern_cache(&runtime.data_dir, runtime.cache_key(), backend);
    let patterns = cache.get(refresh).await?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for pattern in patterns {
        writeln!(out, "{}", pattern)?;
    }
    Ok(())
}

fn write_default_config(output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let content = config::generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write config to {:?}", path))?;
            eprintln!("Config written to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}
