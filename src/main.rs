use anyhow::{Context, Result};
use llmctl::cache::SearchCache;
use llmctl::cli::{Args, CacheAction, ConfigDiscovery, ExecutionMode, output};
use llmctl::client::{ApiClient, ClientConfig};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging on stderr so command output on stdout stays clean
    let filter = EnvFilter::try_from_env(llmctl::env::vars::LOG_FILTER)
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    match mode {
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
        ExecutionMode::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()
                .context("Failed to create default configuration")?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
        mode => {
            let (config, source) = ConfigDiscovery::load(args.config.as_deref())
                .context("Failed to load configuration")?;
            info!("Using configuration from {}", source);
            run(mode, &config).await
        }
    }
}

async fn run(mode: ExecutionMode, config: &ClientConfig) -> Result<()> {
    if let ExecutionMode::Cache(action) = mode {
        return run_cache_action(action, config).await;
    }

    let client = ApiClient::new(config).context("Failed to create API client")?;
    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    match mode {
        ExecutionMode::Chat { prompt, options } => {
            let response = client.chat(&prompt, &options, &cancel).await?;
            println!("{}", response.content);
        }
        ExecutionMode::Search(search) => {
            let results = client
                .web_search(&search.query, &search.options, search.use_cache, &cancel)
                .await?;
            let format = search.options.format.unwrap_or_default();
            println!("{}", output::search_results(&results, format)?);
        }
        ExecutionMode::Read { url } => {
            let page = client.read(&url, &cancel).await?;
            println!("{}", output::page(&page));
        }
        ExecutionMode::Models => {
            let models = client.list_models(&cancel).await?;
            println!("{}", output::models(&models));
        }
        ExecutionMode::Image { prompt, options } => {
            let image = client.generate_image(&prompt, &options, &cancel).await?;
            println!("{}", output::image(&image));
        }
        ExecutionMode::Video { prompt, model } => {
            let task = client
                .generate_video(&prompt, model.as_deref(), &cancel)
                .await?;
            println!("{}", output::video(&task));
        }
        ExecutionMode::Vision(vision) => {
            let response = client
                .analyze_vision(
                    &vision.image_url,
                    &vision.prompt,
                    vision.model.as_deref(),
                    &cancel,
                )
                .await?;
            println!("{}", response.content);
        }
        ExecutionMode::Status => {
            let executor = client.executor();
            let limiter = executor.rate_limiter_status().await;
            println!(
                "{}",
                output::status(&executor.breaker_snapshots(), limiter.as_ref())
            );
        }
        other => anyhow::bail!("{:?} does not use the API client", other),
    }

    Ok(())
}

async fn run_cache_action(action: CacheAction, config: &ClientConfig) -> Result<()> {
    let directory = config.cache.resolved_directory();
    if !config.cache.enabled {
        warn!("Search cache is disabled in configuration");
    }
    let cache = SearchCache::new(&directory);

    match action {
        CacheAction::Clear => {
            let removed = cache
                .clear()
                .await
                .with_context(|| cache_context("clear", &directory))?;
            println!("Removed {} cached searches", removed);
        }
        CacheAction::Cleanup => {
            let stats = cache
                .cleanup()
                .await
                .with_context(|| cache_context("clean up", &directory))?;
            println!("{}", output::cleanup_stats(&stats));
        }
        CacheAction::Stats => {
            let stats = cache
                .stats()
                .await
                .with_context(|| cache_context("read", &directory))?;
            println!("{}", output::cache_stats(&stats));
        }
    }
    Ok(())
}

fn cache_context(action: &str, directory: &Path) -> String {
    format!("Failed to {} search cache at {}", action, directory.display())
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Received Ctrl-C, cancelling outstanding requests");
            eprintln!("Cancelling...");
            cancel.cancel();
        }
    });
}
