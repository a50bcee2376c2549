//! qsl map rendering.
//!
//! a map is the tiles around two grid squares, a marker on each and the
//! great-circle path between them, encoded as png with the tile attribution
//! stored in a `tEXt` chunk.

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage, imageops};

use crate::error::GridMapError;
use crate::geo::{self, LatLng, TILE_SIZE};
use crate::locator::Locator;
use crate::tiles::TileFetcher;

/// segments used to draw the great-circle path.
pub const PATH_SEGMENTS: usize = 64;

/// png text keyword carrying the attribution.
pub const ATTRIBUTION_KEYWORD: &str = "Attribution";

const BACKGROUND: Rgba<u8> = Rgba([221, 221, 221, 255]);
const PATH_COLOR: Rgba<u8> = Rgba([200, 30, 30, 255]);
const MY_COLOR: Rgba<u8> = Rgba([30, 90, 200, 255]);
const THEIR_COLOR: Rgba<u8> = Rgba([220, 120, 0, 255]);
const OUTLINE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// canvas size and zoom. `zoom == 0` picks one automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOptions {
    pub width: u32,
    pub height: u32,
    pub zoom: u8,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            zoom: 0,
        }
    }
}

/// map options plus where the png goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapConfig {
    pub options: MapOptions,
    pub output: PathBuf,
}

/// the attribution text embedded in rendered maps.
pub fn attribution(my: &Locator, their: &Locator, base: &str) -> String {
    format!("QSL Map: {} <-> {}\n{}", my, their, base)
}

fn parse_pair(my: &str, their: &str) -> Result<(Locator, Locator), GridMapError> {
    let my = Locator::parse(my).map_err(GridMapError::MyLocator)?;
    let their = Locator::parse(their).map_err(GridMapError::TheirLocator)?;
    Ok((my, their))
}

/// great-circle distance between the centres of two locators, in km.
pub fn locator_distance_km(my: &str, their: &str) -> Result<f64, GridMapError> {
    let (my, their) = parse_pair(my, their)?;
    Ok(geo::distance_km(my.center(), their.center()))
}

/// render the map for two locators and return the encoded png.
pub async fn render_png<F: TileFetcher>(
    fetcher: &F,
    my: &str,
    their: &str,
    options: MapOptions,
) -> Result<Vec<u8>, GridMapError> {
    let (my, their) = parse_pair(my, their)?;
    let MapOptions { width, height, .. } = options;
    if width == 0 || height == 0 || width > 4096 || height > 4096 {
        return Err(GridMapError::CanvasSize { width, height });
    }

    let from = my.center();
    let to_raw = their.center();
    let to = LatLng::new(to_raw.lat, geo::unwrap_lng(to_raw.lng, from.lng));

    let zoom = match options.zoom {
        0 => geo::auto_zoom(&[from, to], width, height),
        z => z.min(18),
    };
    let world = geo::world_size(zoom);

    // top-left of the canvas in world pixels, centred on the bounding box
    let (ax, ay) = geo::project(from);
    let (bx, by) = geo::project(to);
    let origin_x = (ax + bx) / 2.0 * world - f64::from(width) / 2.0;
    let origin_y = (ay + by) / 2.0 * world - f64::from(height) / 2.0;

    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    draw_tiles(fetcher, &mut canvas, zoom, origin_x, origin_y).await?;

    let to_canvas = |p: LatLng| {
        let (x, y) = geo::project(p);
        (x * world - origin_x, y * world - origin_y)
    };

    let path: Vec<(f64, f64)> = geo::great_circle(from, to_raw, PATH_SEGMENTS)
        .into_iter()
        .map(to_canvas)
        .collect();
    for w in path.windows(2) {
        draw_line(&mut canvas, w[0], w[1], 1.5, PATH_COLOR);
    }
    draw_marker(&mut canvas, to_canvas(from), MY_COLOR);
    draw_marker(&mut canvas, to_canvas(to), THEIR_COLOR);

    let text = attribution(&my, &their, fetcher.attribution());
    encode_png(&canvas, &text)
}

/// render the map and write it to `config.output`.
pub async fn render_map<F: TileFetcher>(
    fetcher: &F,
    my: &str,
    their: &str,
    config: &MapConfig,
) -> Result<(), GridMapError> {
    let png = render_png(fetcher, my, their, config.options).await?;
    write_png(&config.output, &png).await
}

/// like [`render_map`], also returning the distance in km.
///
/// the distance is reported whenever both locators parse, even if rendering
/// or writing fails afterwards.
pub async fn render_with_distance<F: TileFetcher>(
    fetcher: &F,
    my: &str,
    their: &str,
    config: &MapConfig,
) -> (Option<f64>, Result<(), GridMapError>) {
    let distance = locator_distance_km(my, their).ok();
    let result = render_map(fetcher, my, their, config).await;
    (distance, result)
}

async fn write_png(path: &Path, png: &[u8]) -> Result<(), GridMapError> {
    tokio::fs::write(path, png)
        .await
        .map_err(|source| GridMapError::Write {
            path: path.to_path_buf(),
            source,
        })
}

async fn draw_tiles<F: TileFetcher>(
    fetcher: &F,
    canvas: &mut RgbaImage,
    zoom: u8,
    origin_x: f64,
    origin_y: f64,
) -> Result<(), GridMapError> {
    let tile = f64::from(TILE_SIZE);
    let n = 1i64 << zoom;
    let first_x = (origin_x / tile).floor() as i64;
    let last_x = ((origin_x + f64::from(canvas.width())) / tile).floor() as i64;
    let first_y = (origin_y / tile).floor() as i64;
    let last_y = ((origin_y + f64::from(canvas.height())) / tile).floor() as i64;

    for ty in first_y..=last_y {
        if ty < 0 || ty >= n {
            continue;
        }
        for tx in first_x..=last_x {
            // columns wrap around the antimeridian
            let x = tx.rem_euclid(n) as u32;
            let y = ty as u32;
            let bytes = fetcher
                .fetch(zoom, x, y)
                .await
                .map_err(|source| GridMapError::Tile {
                    z: zoom,
                    x,
                    y,
                    source,
                })?;
            let img = image::load_from_memory(&bytes)?.to_rgba8();
            let dx = (tx as f64 * tile - origin_x).round() as i64;
            let dy = (ty as f64 * tile - origin_y).round() as i64;
            imageops::overlay(canvas, &img, dx, dy);
        }
    }
    Ok(())
}

fn fill_disc(canvas: &mut RgbaImage, (cx, cy): (f64, f64), radius: f64, color: Rgba<u8>) {
    let r = radius.ceil() as i64;
    let (ix, iy) = (cx.round() as i64, cy.round() as i64);
    for y in iy - r..=iy + r {
        for x in ix - r..=ix + r {
            if x < 0 || y < 0 || x >= i64::from(canvas.width()) || y >= i64::from(canvas.height()) {
                continue;
            }
            let (fx, fy) = (x as f64 - cx, y as f64 - cy);
            if fx * fx + fy * fy <= radius * radius {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

fn draw_line(
    canvas: &mut RgbaImage,
    a: (f64, f64),
    b: (f64, f64),
    half_width: f64,
    color: Rgba<u8>,
) {
    let len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
    // overlong segments only happen at fixed zooms far past the points
    let limit = f64::from(canvas.width().max(canvas.height())) * 4.0;
    if len > limit {
        return;
    }
    let steps = (len * 2.0).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let p = (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
        fill_disc(canvas, p, half_width, color);
    }
}

fn draw_marker(canvas: &mut RgbaImage, at: (f64, f64), color: Rgba<u8>) {
    fill_disc(canvas, at, 7.0, OUTLINE);
    fill_disc(canvas, at, 5.0, color);
}

/// png text chunks are latin-1.
fn latin1_lossy(s: &str) -> String {
    s.chars()
        .map(|c| if u32::from(c) <= 0xff { c } else { '?' })
        .collect()
}

/// encode an rgba canvas as png with an attribution text chunk.
pub fn encode_png(canvas: &RgbaImage, attribution: &str) -> Result<Vec<u8>, GridMapError> {
    let mut buf = Vec::new();
    let mut encoder = png::Encoder::new(&mut buf, canvas.width(), canvas.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.add_text_chunk(ATTRIBUTION_KEYWORD.to_string(), latin1_lossy(attribution))?;
    let mut writer = encoder.write_header()?;
    writer.write_image_data(canvas.as_raw())?;
    writer.finish()?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LocatorError, TileError};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// serves solid green tiles and records what was asked for.
    struct SolidTiles {
        requested: Mutex<Vec<(u8, u32, u32)>>,
        tile: Vec<u8>,
    }

    impl SolidTiles {
        fn new() -> Self {
            let img = RgbaImage::from_pixel(256, 256, Rgba([0, 160, 0, 255]));
            let mut tile = Vec::new();
            img.write_to(&mut Cursor::new(&mut tile), image::ImageFormat::Png)
                .unwrap();
            Self {
                requested: Mutex::new(Vec::new()),
                tile,
            }
        }
    }

    impl TileFetcher for SolidTiles {
        async fn fetch(&self, z: u8, x: u32, y: u32) -> Result<Vec<u8>, TileError> {
            self.requested.lock().unwrap().push((z, x, y));
            Ok(self.tile.clone())
        }

        fn attribution(&self) -> &str {
            "© test tiles"
        }
    }

    struct DownTiles;

    impl TileFetcher for DownTiles {
        async fn fetch(&self, _: u8, _: u32, _: u32) -> Result<Vec<u8>, TileError> {
            Err(TileError::Status(503))
        }

        fn attribution(&self) -> &str {
            ""
        }
    }

    fn decode(png_bytes: &[u8]) -> (u32, u32, Vec<(String, String)>, RgbaImage) {
        let decoder = png::Decoder::new(Cursor::new(png_bytes));
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        let texts = info
            .uncompressed_latin1_text
            .iter()
            .map(|t| (t.keyword.clone(), t.text.clone()))
            .collect();
        let (w, h) = (info.width, info.height);
        let img = image::load_from_memory(png_bytes).unwrap().to_rgba8();
        (w, h, texts, img)
    }

    #[tokio::test]
    async fn renders_png_with_attribution() {
        let tiles = SolidTiles::new();
        let opts = MapOptions {
            width: 400,
            height: 300,
            zoom: 0,
        };
        let png = render_png(&tiles, "fn31pr", "JO62", opts).await.unwrap();
        let (w, h, texts, img) = decode(&png);

        assert_eq!((w, h), (400, 300));
        assert_eq!(
            texts,
            vec![(
                "Attribution".to_string(),
                "QSL Map: FN31pr <-> JO62\n© test tiles".to_string()
            )]
        );
        assert!(!tiles.requested.lock().unwrap().is_empty());
        // the corner is plain tile
        assert_eq!(img.get_pixel(0, 0), &Rgba([0, 160, 0, 255]));
    }

    #[tokio::test]
    async fn fixed_zoom_is_used() {
        let tiles = SolidTiles::new();
        let opts = MapOptions {
            width: 256,
            height: 256,
            zoom: 3,
        };
        render_png(&tiles, "FN31", "FN42", opts).await.unwrap();
        assert!(tiles.requested.lock().unwrap().iter().all(|&(z, _, _)| z == 3));
    }

    #[tokio::test]
    async fn invalid_locators_name_the_side() {
        let tiles = SolidTiles::new();
        let err = render_png(&tiles, "ZZ99", "JO62", MapOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GridMapError::MyLocator(LocatorError::Character { .. })));
        assert!(err.to_string().starts_with("failed to parse my locator"));

        let err = render_png(&tiles, "JO62", "J", MapOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GridMapError::TheirLocator(LocatorError::Length(1))));
        assert!(tiles.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_to_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = MapConfig {
            options: MapOptions {
                width: 200,
                height: 200,
                zoom: 0,
            },
            output: dir.path().join("map.png"),
        };
        let (distance, result) = render_with_distance(&SolidTiles::new(), "FN31pr", "FN31pr", &config).await;
        result.unwrap();
        assert_eq!(distance, Some(0.0));
        let written = std::fs::read(&config.output).unwrap();
        assert_eq!(decode(&written).0, 200);
    }

    #[tokio::test]
    async fn distance_survives_render_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = MapConfig {
            options: MapOptions::default(),
            output: dir.path().join("map.png"),
        };
        let (distance, result) = render_with_distance(&DownTiles, "FN31pr", "JO62", &config).await;

        let d = distance.unwrap();
        assert!(d > 6000.0 && d < 6500.0, "{}", d);
        let err = result.unwrap_err();
        assert!(matches!(err, GridMapError::Tile { source: TileError::Status(503), .. }));
        assert!(!config.output.exists());
    }

    #[tokio::test]
    async fn write_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = MapConfig {
            options: MapOptions {
                width: 64,
                height: 64,
                zoom: 2,
            },
            output: dir.path().join("missing").join("map.png"),
        };
        let err = render_map(&SolidTiles::new(), "FN31", "JO62", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, GridMapError::Write { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn attribution_is_latin1_safe() {
        let canvas = RgbaImage::from_pixel(2, 2, BACKGROUND);
        let png = encode_png(&canvas, "tiles ★ © osm").unwrap();
        let (_, _, texts, _) = decode(&png);
        assert_eq!(texts[0].1, "tiles ? © osm");
    }

    #[tokio::test]
    async fn canvas_size_is_checked() {
        let opts = MapOptions {
            width: 0,
            height: 10,
            zoom: 1,
        };
        let err = render_png(&SolidTiles::new(), "FN31", "JO62", opts)
            .await
            .unwrap_err();
        assert!(matches!(err, GridMapError::CanvasSize { width: 0, height: 10 }));
    }
}
