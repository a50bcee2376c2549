//! the `serve` subcommand - runs the web server.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use color_eyre::eyre::{Context, Result, bail};
use groundwave_db::GroundwaveDb;
use groundwave_gridmap::HttpTileFetcher;
use groundwave_types::{Config, RuntimeEnv};
use groundwave_whatsapp::{BridgeTransport, ClientOptions, WhatsAppClient};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::AppState;
use crate::auth::build_webauthn;
use crate::chat::{ChatBackend, OpenAiChatBackend};
use crate::session::spawn_session_sweeper;
use crate::whatsapp_ingest::{ContactMessageHandler, DbDeviceContainer};
use crate::zettel::{ZettelIndex, spawn_rebuild_worker};

/// default config file search paths (in order of priority).
const CONFIG_SEARCH_PATHS: &[&str] = &["/etc/groundwave/config.toml", "./config.toml"];

/// run the groundwave web server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// path to config file (toml format)
    #[arg(short, long, env = "GROUNDWAVE_CONFIG")]
    config: Option<PathBuf>,

    /// database url (sqlite:// or postgres://)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// secret for request tokens and proof-of-work challenges
    #[arg(long, env = "CSRF_SECRET", hide_env_values = true)]
    csrf_secret: Option<String>,

    /// address to listen on
    #[arg(long, env = "GROUNDWAVE_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// public url of this instance
    #[arg(long, env = "GROUNDWAVE_BASE_URL")]
    base_url: Option<String>,

    /// runtime environment (development or production)
    #[arg(long, env = "GROUNDWAVE_ENV")]
    env: Option<String>,

    /// force the development environment
    #[arg(long, default_value_t = false)]
    dev: bool,

    /// log level
    #[arg(long, env = "GROUNDWAVE_LOG_LEVEL")]
    log_level: Option<String>,

    /// directory of org notes imported on every rebuild
    #[arg(long, env = "GROUNDWAVE_NOTES_DIR")]
    notes_dir: Option<PathBuf>,

    /// websocket url of the whatsapp bridge; enables whatsapp
    #[arg(long, env = "GROUNDWAVE_WHATSAPP_BRIDGE_URL")]
    whatsapp_bridge_url: Option<String>,

    /// contact uri published in security.txt
    #[arg(long, env = "GROUNDWAVE_SECURITY_CONTACT")]
    security_contact: Option<String>,
}

/// find and load the config file, returning none if there is none.
pub(crate) fn load_config_file(config_path: Option<&PathBuf>) -> Result<Option<Config>> {
    // an explicit path must exist
    if let Some(path) = config_path {
        return read_config(path).map(Some);
    }

    for path in CONFIG_SEARCH_PATHS.iter().map(PathBuf::from) {
        if path.exists() {
            debug!("Found config file at {:?}", path);
            return read_config(&path).map(Some);
        }
    }
    Ok(None)
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config file: {:?}", path))
}

fn parse_log_level(s: &str) -> Level {
    match s.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

impl ServeCommand {
    /// convert cli arguments into a config, merging with the config file.
    ///
    /// priority order: defaults -> config file -> cli flags and env
    fn into_config(self) -> Result<Config> {
        let mut config = match load_config_file(self.config.as_ref())? {
            Some(file_config) => {
                info!("Loaded configuration from file");
                file_config
            }
            None => {
                debug!("No config file found, using defaults");
                Config::default()
            }
        };

        if let Some(url) = self.database_url {
            config.database.url = Some(SecretString::from(url));
        }
        if let Some(secret) = self.csrf_secret.filter(|s| !s.is_empty()) {
            config.csrf_secret = Some(SecretString::from(secret));
        }
        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(env) = self.env {
            config.env = env
                .parse()
                .with_context(|| format!("invalid GROUNDWAVE_ENV '{}'", env))?;
        }
        if self.dev {
            config.env = RuntimeEnv::Development;
        }
        if let Some(dir) = self.notes_dir {
            config.zettel.notes_dir = Some(dir);
        }
        if let Some(url) = self.whatsapp_bridge_url {
            config.whatsapp.enabled = true;
            config.whatsapp.bridge_url = Some(url);
        }

        if let Some(contact) = self.security_contact.filter(|c| !c.is_empty()) {
            config.security_txt.contact = vec![contact];
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// run the serve command
    pub async fn run(self) -> Result<()> {
        let log_level = parse_log_level(self.log_level.as_deref().unwrap_or("info"));
        let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
        tracing::subscriber::set_global_default(subscriber)?;

        info!(
            version = env!("CARGO_PKG_VERSION"),
            commit = env!("GROUNDWAVE_GIT_SHA"),
            "Starting groundwave..."
        );

        let config = self.into_config()?;
        info!(env = config.env.as_str(), "Runtime environment");
        info!("Listen address: {}", config.listen_addr);
        info!("Base URL: {}", config.base_url);

        let db = GroundwaveDb::new(&config.database)
            .await
            .context("failed to initialize database")?;
        info!("Running database migrations...");
        db.migrate()
            .await
            .context("failed to run database migrations")?;
        info!("Database initialized successfully");

        let webauthn = build_webauthn(&config).context("failed to configure webauthn")?;
        let tiles = HttpTileFetcher::new(
            config.gridmap.tile_url.clone(),
            config.gridmap.attribution.clone(),
            &config.gridmap.user_agent,
        )
        .context("failed to build tile client")?;

        let cancel = CancellationToken::new();

        let zettels = Arc::new(ZettelIndex::new(
            db.clone(),
            config.zettel.notes_dir.clone(),
        ));
        let (rebuild, rebuild_task) = spawn_rebuild_worker(zettels.clone(), cancel.clone());
        let sweeper = spawn_session_sweeper(
            db.clone(),
            Duration::from_secs(config.session.sweep_interval_secs.max(1)),
            cancel.clone(),
        );

        let chat = match &config.chat.endpoint {
            Some(endpoint) => {
                let backend = OpenAiChatBackend::new(
                    endpoint,
                    config.chat.model.clone(),
                    config.chat.api_key.clone(),
                    Duration::from_secs(config.chat.timeout_secs),
                )
                .context("failed to build chat client")?;
                info!(model = %config.chat.model, "Zettel chat enabled");
                Some(Arc::new(backend) as Arc<dyn ChatBackend>)
            }
            None => None,
        };

        let whatsapp = if config.whatsapp.enabled {
            let Some(url) = config.whatsapp.bridge_url.clone() else {
                bail!("whatsapp is enabled but no bridge_url is configured");
            };
            let client = WhatsAppClient::new(
                Arc::new(DbDeviceContainer::new(db.clone())),
                Arc::new(BridgeTransport::new(url)),
                Arc::new(ContactMessageHandler::new(db.clone())),
                ClientOptions {
                    auto_reconnect: config.whatsapp.auto_reconnect,
                    trust_identity: config.whatsapp.trust_identity,
                    ..ClientOptions::default()
                },
            );
            // a broken bridge must not keep the rest of the app down
            if let Err(e) = client.start().await {
                warn!(error = %e, "Failed to start whatsapp client");
            }
            Some(client)
        } else {
            None
        };

        let addr: SocketAddr = config
            .listen_addr
            .parse()
            .context("invalid listen address")?;

        let mut state = AppState::new(db, config, webauthn, zettels, rebuild, tiles);
        if let Some(chat) = chat {
            state = state.with_chat(chat);
        }
        if let Some(client) = whatsapp.clone() {
            state = state.with_whatsapp(client);
        }
        let app = crate::create_app(state);

        info!("Starting HTTP server on {}", addr);
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

        info!("Shutting down workers...");
        cancel.cancel();
        if let Some(client) = whatsapp {
            client.disconnect().await;
        }
        let _ = tokio::join!(rebuild_task, sweeper);
        info!("Shutdown complete");
        Ok(())
    }
}

/// resolves on ctrl-c or sigterm.
async fn shutdown_signal() {
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeCommand,
    }

    fn parse(args: &[&str]) -> ServeCommand {
        let mut argv = vec!["groundwave"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).serve
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_log_level("bogus"), Level::INFO);
    }

    #[test]
    fn test_load_config_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
base_url = "https://gw.example.com"
csrf_secret = "from-file"

[database]
url = "sqlite::memory:"

[sensitive]
duration_secs = 300
"#
        )
        .unwrap();

        let config = load_config_file(Some(&file.path().to_path_buf()))
            .unwrap()
            .unwrap();
        assert_eq!(config.base_url, "https://gw.example.com");
        assert_eq!(config.sensitive.duration_secs, 300);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let path = PathBuf::from("/nonexistent/groundwave.toml");
        assert!(load_config_file(Some(&path)).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
listen_addr = "127.0.0.1:1"
csrf_secret = "from-file"
env = "production"

[database]
url = "sqlite::memory:"
"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let config = parse(&[
            "--config",
            path,
            "--listen-addr",
            "127.0.0.1:9000",
            "--csrf-secret",
            "from-flag",
            "--dev",
        ])
        .into_config()
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.csrf_secret.unwrap().expose_secret(), "from-flag");
        assert_eq!(config.env, RuntimeEnv::Development);
    }

    #[test]
    fn test_invalid_env_aborts() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "csrf_secret = \"s\"\n[database]\nurl = \"sqlite::memory:\"\n"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();
        assert!(parse(&["--config", path, "--env", "staging"]).into_config().is_err());
    }

    #[test]
    fn test_missing_secret_aborts() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[database]\nurl = \"sqlite::memory:\"\n").unwrap();
        let path = file.path().to_str().unwrap();
        // CSRF_SECRET may be set in the environment running the tests
        let cmd = parse(&["--config", path]);
        if cmd.csrf_secret.is_none() {
            assert!(cmd.into_config().is_err());
        }
    }
}
