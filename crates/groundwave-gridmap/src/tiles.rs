//! slippy-map tile sources.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::TileError;

/// default tile server.
pub const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// attribution required by the default tile server.
pub const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// source of encoded (png/jpeg) map tiles.
pub trait TileFetcher: Send + Sync {
    /// fetch the tile at zoom `z`, column `x`, row `y`.
    fn fetch(&self, z: u8, x: u32, y: u32) -> impl Future<Output = Result<Vec<u8>, TileError>> + Send;

    /// attribution text of the tile provider.
    fn attribution(&self) -> &str;
}

/// fetches tiles over http from a `{z}/{x}/{y}` url template.
#[derive(Debug, Clone)]
pub struct HttpTileFetcher {
    client: Client,
    url_template: String,
    attribution: String,
}

impl HttpTileFetcher {
    /// tile servers generally reject requests without an identifying user agent.
    pub fn new(
        url_template: impl Into<String>,
        attribution: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self, TileError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            url_template: url_template.into(),
            attribution: attribution.into(),
        })
    }

    fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        self.url_template
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, z: u8, x: u32, y: u32) -> Result<Vec<u8>, TileError> {
        let url = self.tile_url(z, x, y);
        debug!(%url, "fetching tile");
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(TileError::Status(resp.status().as_u16()));
        }
        Ok(resp.bytes().await?.to_vec())
    }

    fn attribution(&self) -> &str {
        &self.attribution
    }
}
