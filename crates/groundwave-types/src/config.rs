//! configuration types for groundwave

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::{Error, RuntimeEnv};

/// main configuration for groundwave.
///
/// every section has defaults so a config file only needs the values it
/// changes. secrets are wrapped as soon as they are read and never
/// serialized back out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// address to bind the http server to.
    pub listen_addr: String,

    /// public url of this instance, used for webauthn and link annotation.
    pub base_url: String,

    pub env: RuntimeEnv,

    /// secret for csrf tokens and proof-of-work challenges.
    #[serde(deserialize_with = "optional_secret")]
    pub csrf_secret: Option<SecretString>,

    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub sensitive: SensitiveConfig,
    pub zettel: ZettelConfig,
    pub gridmap: GridMapConfig,
    pub whatsapp: WhatsAppConfig,
    pub chat: ChatConfig,
    pub pow: PowConfig,
    pub webauthn: WebAuthnConfig,
    pub security_txt: SecurityTxtConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            base_url: "http://localhost:8080".to_string(),
            env: RuntimeEnv::Development,
            csrf_secret: None,
            database: DatabaseConfig::default(),
            session: SessionConfig::default(),
            sensitive: SensitiveConfig::default(),
            zettel: ZettelConfig::default(),
            gridmap: GridMapConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            chat: ChatConfig::default(),
            pow: PowConfig::default(),
            webauthn: WebAuthnConfig::default(),
            security_txt: SecurityTxtConfig::default(),
        }
    }
}

impl Config {
    /// check the settings startup cannot do without.
    pub fn validate(&self) -> Result<(), Error> {
        if self.database.url.is_none() {
            return Err(Error::MissingConfig("DATABASE_URL"));
        }
        if self.csrf_secret.is_none() {
            return Err(Error::MissingConfig("CSRF_SECRET"));
        }
        if self.pow.difficulty_bits > 64 {
            return Err(Error::InvalidConfig(format!(
                "pow difficulty of {} bits is out of range",
                self.pow.difficulty_bits
            )));
        }
        self.base()?;
        Ok(())
    }

    fn base(&self) -> Result<url::Url, Error> {
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidConfig(format!("base_url '{}': {}", self.base_url, e)))
    }

    /// webauthn relying party id: configured, else the host of `base_url`.
    pub fn rp_id(&self) -> Result<String, Error> {
        if let Some(id) = &self.webauthn.rp_id {
            return Ok(id.clone());
        }
        self.base()?
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidConfig(format!("base_url '{}' has no host", self.base_url)))
    }

    /// webauthn origin: configured, else the origin of `base_url`.
    pub fn rp_origin(&self) -> Result<url::Url, Error> {
        match &self.webauthn.rp_origin {
            Some(origin) => url::Url::parse(origin)
                .map_err(|e| Error::InvalidConfig(format!("rp_origin '{}': {}", origin, e))),
            None => {
                let base = self.base()?;
                url::Url::parse(&base.origin().ascii_serialization())
                    .map_err(|e| Error::InvalidConfig(e.to_string()))
            }
        }
    }
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()).map(SecretString::from))
}

/// database configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// postgres:// or sqlite:// url.
    #[serde(deserialize_with = "optional_secret")]
    pub url: Option<SecretString>,

    /// maximum pooled connections.
    pub max_connections: Option<u32>,
}

/// session cookie and lifetime settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,

    /// absolute lifetime of a session in seconds.
    pub lifetime_secs: u64,

    /// how often expired sessions are swept, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "groundwave_session".to_string(),
            lifetime_secs: 14 * 24 * 3600,
            sweep_interval_secs: 3600,
        }
    }
}

/// sensitive access and break-glass windows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensitiveConfig {
    /// elevation lifetime after an unlock, in seconds.
    pub duration_secs: u64,

    /// break-glass window for health profiles, in seconds.
    pub break_glass_secs: u64,
}

impl Default for SensitiveConfig {
    fn default() -> Self {
        Self {
            duration_secs: 600,
            break_glass_secs: 900,
        }
    }
}

/// zettelkasten settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ZettelConfig {
    /// directory of `.org` files imported on every rebuild.
    pub notes_dir: Option<PathBuf>,
}

/// qsl map tiles and canvas.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GridMapConfig {
    /// tile url template with `{z}`, `{x}` and `{y}`.
    pub tile_url: String,
    pub attribution: String,
    /// user agent sent to the tile server.
    pub user_agent: String,
    pub width: u32,
    pub height: u32,
}

impl Default for GridMapConfig {
    fn default() -> Self {
        Self {
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            user_agent: concat!("groundwave/", env!("CARGO_PKG_VERSION")).to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// whatsapp side channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub enabled: bool,

    /// websocket url of the protocol bridge.
    pub bridge_url: Option<String>,

    pub auto_reconnect: bool,

    /// accept identity changes of contacts.
    pub trust_identity: bool,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bridge_url: None,
            auto_reconnect: true,
            trust_identity: true,
        }
    }
}

/// openai-compatible chat backend for zettel questions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// base url; `/chat/completions` is appended. none disables chat.
    pub endpoint: Option<String>,
    pub model: String,
    #[serde(deserialize_with = "optional_secret")]
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 300,
        }
    }
}

/// proof-of-work challenge settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PowConfig {
    /// leading zero bits required of sha256(challenge ‖ nonce).
    pub difficulty_bits: u32,
    /// challenge validity in seconds.
    pub challenge_ttl_secs: u64,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            difficulty_bits: 16,
            challenge_ttl_secs: 600,
        }
    }
}

/// webauthn relying party overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebAuthnConfig {
    pub rp_id: Option<String>,
    pub rp_origin: Option<String>,
    pub rp_name: String,
}

impl Default for WebAuthnConfig {
    fn default() -> Self {
        Self {
            rp_id: None,
            rp_origin: None,
            rp_name: "groundwave".to_string(),
        }
    }
}

/// contents of `/security.txt` (rfc 9116).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityTxtConfig {
    /// `mailto:` or `https:` uris; the file is not served without one.
    pub contact: Vec<String>,
    /// days from now advertised in `Expires`.
    pub expires_days: u32,
    pub policy: Option<String>,
    pub preferred_languages: Option<String>,
}

impl Default for SecurityTxtConfig {
    fn default() -> Self {
        Self {
            contact: Vec::new(),
            expires_days: 365,
            policy: None,
            preferred_languages: None,
        }
    }
}
