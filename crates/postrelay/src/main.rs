// # postrelay - One-shot Relay Runner
//
// A thin integration layer around `postrelay_core::RelayEngine`. It is meant
// to be started by an external scheduler (cron, a CI schedule, a systemd
// timer); every invocation performs exactly one run and exits.
//
// The binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and the delivery transport
// 4. Running the engine once and mapping the outcome to an exit code
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Source
// - `POSTRELAY_PROFILE`: Profile handle to track (required, leading `@` is stripped)
// - `POSTRELAY_PROVIDER_ORDER`: Comma-separated provider order (default: `apify,web`)
// - `POSTRELAY_APIFY_TOKEN`: Apify API token (apify is skipped at fetch time without it)
// - `POSTRELAY_APIFY_ACTOR`: Apify actor id (optional)
// - `POSTRELAY_WEB_SESSION_ID`: Instagram `sessionid` cookie for the web provider (optional)
// - `POSTRELAY_FETCH_LIMIT`: Items requested in backlog mode (default: 3)
// - `POSTRELAY_FETCH_TIMEOUT_SECS`: Deadline per provider attempt (default: 90)
//
// ### Delivery
// - `POSTRELAY_WEBHOOK_URL`: Discord webhook URL (required unless dry run)
// - `POSTRELAY_MAX_MEDIA_REFS`: Media references per message (default: 4)
// - `POSTRELAY_MAX_DELIVERY_ATTEMPTS`: Attempts including the first (default: 3)
// - `POSTRELAY_DELIVERY_MODE`: `newest` or `backlog` (default: `newest`)
//
// ### State
// - `POSTRELAY_STATE_PATH`: Dedupe state file (default: `.state/last_post.json`)
//
// ### Run
// - `POSTRELAY_FORCE`: Announce the newest post even if already seen
// - `POSTRELAY_DRY_RUN`: Fetch and format only; never deliver or persist
// - `POSTRELAY_SKIP_ON_FETCH_ERROR`: Exit cleanly when every provider fails (default: true)
// - `POSTRELAY_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export POSTRELAY_PROFILE=somehandle
// export POSTRELAY_APIFY_TOKEN=apify_api_xxx
// export POSTRELAY_WEBHOOK_URL=https://discord.com/api/webhooks/...
//
// postrelay
// ```

use anyhow::Result;
use postrelay_core::{
    DeliveryConfig, DeliveryMode, ProviderConfig, ProviderRegistry, RelayConfig, RelayEngine, RunConfig, RunEvent,
    StateStoreConfig,
};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the scheduler
///
/// - 0: The run finished with any non-fatal outcome
/// - 1: Configuration or startup error
/// - 2: Fatal run error (state unavailable, delivery failed, fetch failed with skipping disabled)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostrelayExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<PostrelayExitCode> for ExitCode {
    fn from(code: PostrelayExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

const DEFAULT_PROVIDER_ORDER: &str = "apify,web";
const DEFAULT_STATE_PATH: &str = ".state/last_post.json";
const SUPPORTED_PROVIDERS: &[&str] = &["apify", "web"];

/// Application configuration
struct Config {
    profile: String,
    provider_order: Vec<String>,
    apify_token: Option<String>,
    apify_actor: Option<String>,
    web_session_id: Option<String>,
    webhook_url: Option<String>,
    state_path: String,
    force: bool,
    dry_run: bool,
    skip_on_fetch_error: bool,
    fetch_limit: usize,
    fetch_timeout_secs: u64,
    max_media_refs: usize,
    max_delivery_attempts: u32,
    delivery_mode: String,
    log_level: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<REDACTED>");
        f.debug_struct("Config")
            .field("profile", &self.profile)
            .field("provider_order", &self.provider_order)
            .field("apify_token", &redact(&self.apify_token))
            .field("apify_actor", &self.apify_actor)
            .field("web_session_id", &redact(&self.web_session_id))
            .field("webhook_url", &redact(&self.webhook_url))
            .field("state_path", &self.state_path)
            .field("force", &self.force)
            .field("dry_run", &self.dry_run)
            .field("skip_on_fetch_error", &self.skip_on_fetch_error)
            .field("fetch_limit", &self.fetch_limit)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_media_refs", &self.max_media_refs)
            .field("max_delivery_attempts", &self.max_delivery_attempts)
            .field("delivery_mode", &self.delivery_mode)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup
    ///
    /// Blank values are treated as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            profile: var("POSTRELAY_PROFILE")
                .map(|p| p.trim_start_matches('@').to_string())
                .unwrap_or_default(),
            provider_order: var("POSTRELAY_PROVIDER_ORDER")
                .unwrap_or_else(|| DEFAULT_PROVIDER_ORDER.to_string())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            apify_token: var("POSTRELAY_APIFY_TOKEN"),
            apify_actor: var("POSTRELAY_APIFY_ACTOR"),
            web_session_id: var("POSTRELAY_WEB_SESSION_ID"),
            webhook_url: var("POSTRELAY_WEBHOOK_URL"),
            state_path: var("POSTRELAY_STATE_PATH").unwrap_or_else(|| DEFAULT_STATE_PATH.to_string()),
            force: parse_flag("POSTRELAY_FORCE", var("POSTRELAY_FORCE"), false)?,
            dry_run: parse_flag("POSTRELAY_DRY_RUN", var("POSTRELAY_DRY_RUN"), false)?,
            skip_on_fetch_error: parse_flag(
                "POSTRELAY_SKIP_ON_FETCH_ERROR",
                var("POSTRELAY_SKIP_ON_FETCH_ERROR"),
                true,
            )?,
            fetch_limit: parse_number("POSTRELAY_FETCH_LIMIT", var("POSTRELAY_FETCH_LIMIT"), 3)?,
            fetch_timeout_secs: parse_number("POSTRELAY_FETCH_TIMEOUT_SECS", var("POSTRELAY_FETCH_TIMEOUT_SECS"), 90)?,
            max_media_refs: parse_number("POSTRELAY_MAX_MEDIA_REFS", var("POSTRELAY_MAX_MEDIA_REFS"), 4)?,
            max_delivery_attempts: parse_number(
                "POSTRELAY_MAX_DELIVERY_ATTEMPTS",
                var("POSTRELAY_MAX_DELIVERY_ATTEMPTS"),
                3,
            )?,
            delivery_mode: var("POSTRELAY_DELIVERY_MODE")
                .map(|m| m.to_lowercase())
                .unwrap_or_else(|| "newest".to_string()),
            log_level: var("POSTRELAY_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.profile.is_empty() {
            anyhow::bail!(
                "POSTRELAY_PROFILE is required. \
                Set it via: export POSTRELAY_PROFILE=somehandle"
            );
        }

        if self.provider_order.is_empty() {
            anyhow::bail!(
                "POSTRELAY_PROVIDER_ORDER must list at least one provider. \
                Supported providers: {}",
                SUPPORTED_PROVIDERS.join(", ")
            );
        }

        for provider in &self.provider_order {
            if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
                anyhow::bail!(
                    "POSTRELAY_PROVIDER_ORDER entry '{}' is not supported. \
                    Supported providers: {}",
                    provider,
                    SUPPORTED_PROVIDERS.join(", ")
                );
            }
        }

        match &self.webhook_url {
            Some(url) => {
                // The URL is a credential, so it is never echoed back
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    anyhow::bail!("POSTRELAY_WEBHOOK_URL must use HTTP or HTTPS scheme");
                }
            }
            None if !self.dry_run => {
                anyhow::bail!(
                    "POSTRELAY_WEBHOOK_URL is required unless POSTRELAY_DRY_RUN is enabled"
                );
            }
            None => {}
        }

        if self.state_path.ends_with('/') {
            anyhow::bail!("POSTRELAY_STATE_PATH must name a file, got a directory: {}", self.state_path);
        }

        if !(1..=postrelay_core::config::MAX_FETCH_LIMIT).contains(&self.fetch_limit) {
            anyhow::bail!(
                "POSTRELAY_FETCH_LIMIT must be between 1 and {}. Got: {}",
                postrelay_core::config::MAX_FETCH_LIMIT,
                self.fetch_limit
            );
        }

        if !(10..=600).contains(&self.fetch_timeout_secs) {
            anyhow::bail!(
                "POSTRELAY_FETCH_TIMEOUT_SECS must be between 10 and 600 seconds. Got: {}",
                self.fetch_timeout_secs
            );
        }

        if !(1..=10).contains(&self.max_media_refs) {
            anyhow::bail!(
                "POSTRELAY_MAX_MEDIA_REFS must be between 1 and 10. Got: {}",
                self.max_media_refs
            );
        }

        if !(1..=10).contains(&self.max_delivery_attempts) {
            anyhow::bail!(
                "POSTRELAY_MAX_DELIVERY_ATTEMPTS must be between 1 and 10. Got: {}",
                self.max_delivery_attempts
            );
        }

        self.delivery_mode()?;
        self.level()?;

        Ok(())
    }

    fn delivery_mode(&self) -> Result<DeliveryMode> {
        match self.delivery_mode.as_str() {
            "newest" => Ok(DeliveryMode::Newest),
            "backlog" => Ok(DeliveryMode::Backlog),
            other => anyhow::bail!(
                "POSTRELAY_DELIVERY_MODE '{}' is not valid. \
                Valid modes: newest, backlog",
                other
            ),
        }
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "POSTRELAY_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build the core configuration
    fn to_relay_config(&self) -> Result<RelayConfig> {
        let providers = self
            .provider_order
            .iter()
            .map(|name| match name.as_str() {
                "apify" => ProviderConfig::Apify {
                    api_token: self.apify_token.clone().unwrap_or_default(),
                    actor: self.apify_actor.clone(),
                },
                _ => ProviderConfig::Web {
                    session_id: self.web_session_id.clone(),
                },
            })
            .collect();

        // A dry run never builds a transport, even with a webhook configured
        let delivery = if self.dry_run {
            None
        } else {
            self.webhook_url.clone().map(|webhook_url| DeliveryConfig::Discord { webhook_url })
        };

        let run = RunConfig {
            force: self.force,
            dry_run: self.dry_run,
            skip_on_fetch_error: self.skip_on_fetch_error,
            fetch_limit: self.fetch_limit,
            fetch_timeout_secs: self.fetch_timeout_secs,
            max_media_refs: self.max_media_refs,
            max_delivery_attempts: self.max_delivery_attempts,
            delivery_mode: self.delivery_mode()?,
            ..RunConfig::default()
        };

        Ok(RelayConfig {
            profile: self.profile.clone(),
            providers,
            state_store: StateStoreConfig::File {
                path: self.state_path.clone(),
            },
            delivery,
            run,
        })
    }
}

fn parse_flag(name: &str, value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("{} must be a boolean (true/false). Got: {}", name, other),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: {}", name, raw)),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return PostrelayExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return PostrelayExitCode::ConfigError.into();
    }

    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PostrelayExitCode::ConfigError.into();
    }

    info!("Starting postrelay for @{}", config.profile);
    info!(
        "Provider order: {} (mode={}, force={}, dry_run={})",
        config.provider_order.join(","),
        config.delivery_mode,
        config.force,
        config.dry_run
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PostrelayExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(config)).into()
}

/// Register every compiled-in plugin
fn build_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "apify")]
    {
        debug!("Registering Apify provider");
        postrelay_provider_apify::register(&registry);
    }

    #[cfg(feature = "web")]
    {
        debug!("Registering web profile provider");
        postrelay_provider_web::register(&registry);
    }

    #[cfg(feature = "discord")]
    {
        debug!("Registering Discord transport");
        postrelay_delivery_discord::register(&registry);
    }

    registry
}

/// Create the engine from configuration
fn build_engine(
    registry: &ProviderRegistry,
    config: RelayConfig,
) -> postrelay_core::Result<(RelayEngine, mpsc::Receiver<RunEvent>)> {
    let providers = registry.create_providers(&config.providers)?;
    let store = registry.create_state_store(&config.state_store)?;
    let transport = match &config.delivery {
        Some(delivery) => Some(registry.create_transport(delivery)?),
        None => None,
    };

    RelayEngine::new(providers, store, transport, config)
}

/// Perform one run
async fn run(config: Config) -> PostrelayExitCode {
    if config.provider_order.iter().any(|p| p == "apify") && config.apify_token.is_none() {
        warn!("POSTRELAY_APIFY_TOKEN is not set; the apify provider will be skipped");
    }

    let relay_config = match config.to_relay_config() {
        Ok(relay_config) => relay_config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return PostrelayExitCode::ConfigError;
        }
    };

    let registry = build_registry();
    let (engine, mut events) = match build_engine(&registry, relay_config) {
        Ok(built) => built,
        Err(e) => {
            error!("Failed to initialize relay: {}", e);
            return PostrelayExitCode::ConfigError;
        }
    };

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Run event: {:?}", event);
        }
    });

    let result = engine.run().await;

    // Dropping the engine closes the event channel so the logger drains and ends
    drop(engine);
    if let Err(e) = event_logger.await {
        warn!("Event logger task failed: {}", e);
    }

    match result {
        Ok(outcome) => {
            info!("Run finished: {}", outcome.label());
            PostrelayExitCode::Success
        }
        Err(e) => {
            error!("Run failed: {}", e);
            PostrelayExitCode::RuntimeError
        }
    }
}
