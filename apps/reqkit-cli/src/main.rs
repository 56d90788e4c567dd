use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use reqkit::{
    ApiClient, CallOptions, CancellationToken, ErrorPolicy, LogNotifier, Method, NoopNavigator,
    Route, StaticToken,
};
use runtime::{AppConfig, CliArgs};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// reqkit CLI - call backend routes through the request pipeline
#[derive(Parser)]
#[command(name = "reqkit-cli")]
#[command(about = "reqkit CLI - call backend routes through the request pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Bearer token (overrides config)
    #[arg(long)]
    token: Option<String>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a route and print the JSON response
    Get {
        /// Route template, e.g. /api/v1/items/{id}/
        path: String,

        /// Path parameter as name=value (repeatable)
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// Query parameter as name=value (repeatable)
        #[arg(long = "query", value_name = "NAME=VALUE")]
        query: Vec<String>,

        /// Skip the Authorization header
        #[arg(long)]
        no_auth: bool,

        /// Do not report backend failures
        #[arg(long)]
        silent: bool,
    },
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        base_url: cli.base_url.clone(),
        token: cli.token.clone(),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args)?;

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new("."));
    tracing::debug!(base_url = %config.api.base_url, "reqkit-cli starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Get {
            path,
            params,
            query,
            no_auth,
            silent,
        } => {
            let mut options = CallOptions::new();
            for (name, value) in parse_pairs(&params)? {
                options = options.path_param(name, value);
            }
            for (name, value) in parse_pairs(&query)? {
                options = options.query(name, value);
            }
            if silent {
                options = options.silent();
            }
            get(&config, &path, no_auth, options).await
        }
        Commands::Check => check_config(config),
    }
}

async fn get(config: &AppConfig, path: &str, no_auth: bool, options: CallOptions) -> Result<()> {
    let tokens = Arc::new(StaticToken(config.api.token.clone()));
    let client = ApiClient::from_config(&config.api, tokens);
    let policy = ErrorPolicy::new(Arc::new(LogNotifier), Arc::new(NoopNavigator));

    let mut route: Route<(), Value> = Route::dynamic(path, Method::Get);
    if no_auth {
        route = route.without_auth();
    }

    // Ctrl-C abandons the in-flight call.
    let signal = CancellationToken::new();
    let on_interrupt = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match client.execute(&route, options.signal(signal)).await {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(err) => {
            policy.handle(&err);
            Err(anyhow!(err)).with_context(|| format!("GET {path} failed"))
        }
    }
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    config.validate()?;
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}

/// Split `name=value` arguments.
fn parse_pairs(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|item| {
            item.split_once('=')
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{}'", item))
        })
        .collect()
}
