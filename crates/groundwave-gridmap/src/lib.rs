//! qsl map rendering for groundwave.
//!
//! draws two maidenhead grid squares and the great-circle path between them
//! on slippy-map tiles and encodes the result as png.

mod error;
mod geo;
mod locator;
mod render;
mod tiles;

pub use error::{GridMapError, LocatorError, TileError};
pub use geo::{EARTH_RADIUS_KM, LatLng, TILE_SIZE, auto_zoom, distance_km, great_circle};
pub use locator::Locator;
pub use render::{
    ATTRIBUTION_KEYWORD, MapConfig, MapOptions, PATH_SEGMENTS, attribution, encode_png,
    locator_distance_km, render_map, render_png, render_with_distance,
};
pub use tiles::{HttpTileFetcher, OSM_ATTRIBUTION, OSM_TILE_URL, TileFetcher};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, GridMapError>;
