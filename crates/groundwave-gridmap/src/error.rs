//! error types for groundwave-gridmap

use std::path::PathBuf;

use thiserror::Error;

/// why a locator string was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("locator must be 4, 6 or 8 characters, got {0}")]
    Length(usize),

    #[error("invalid character '{ch}' at position {pos}")]
    Character { ch: char, pos: usize },
}

/// errors from fetching map tiles.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tile server returned status {0}")]
    Status(u16),
}

/// errors from rendering a qsl map.
#[derive(Debug, Error)]
pub enum GridMapError {
    #[error("failed to parse my locator: {0}")]
    MyLocator(#[source] LocatorError),

    #[error("failed to parse their locator: {0}")]
    TheirLocator(#[source] LocatorError),

    #[error("invalid canvas size {width}x{height}")]
    CanvasSize { width: u32, height: u32 },

    #[error("failed to fetch tile {z}/{x}/{y}: {source}")]
    Tile {
        z: u8,
        x: u32,
        y: u32,
        #[source]
        source: TileError,
    },

    #[error("failed to decode tile: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to encode png: {0}")]
    Encode(#[from] png::EncodingError),

    #[error("failed to write map to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
