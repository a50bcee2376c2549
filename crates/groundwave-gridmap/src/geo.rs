//! spherical geometry and web mercator projection.

use std::f64::consts::PI;

/// mean earth radius in km (iugg).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// slippy-map tile edge in pixels.
pub const TILE_SIZE: u32 = 256;

/// latitude limit of the web mercator projection.
const MAX_LAT: f64 = 85.051_128_78;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// great-circle distance in km (haversine).
pub fn distance_km(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

fn to_vec(p: LatLng) -> [f64; 3] {
    let (lat, lng) = (p.lat.to_radians(), p.lng.to_radians());
    [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
}

fn from_vec(v: [f64; 3]) -> LatLng {
    let lat = v[2].atan2((v[0] * v[0] + v[1] * v[1]).sqrt());
    let lng = v[1].atan2(v[0]);
    LatLng::new(lat.to_degrees(), lng.to_degrees())
}

/// move `lng` by whole turns so it is within 180° of `reference`.
pub fn unwrap_lng(lng: f64, reference: f64) -> f64 {
    let mut lng = lng;
    while lng - reference > 180.0 {
        lng -= 360.0;
    }
    while lng - reference < -180.0 {
        lng += 360.0;
    }
    lng
}

/// `segments + 1` points along the great circle from `a` to `b`.
///
/// longitudes are unwrapped along the way so consecutive points never jump
/// across the antimeridian.
pub fn great_circle(a: LatLng, b: LatLng, segments: usize) -> Vec<LatLng> {
    let segments = segments.max(1);
    let (va, vb) = (to_vec(a), to_vec(b));
    let dot = (va[0] * vb[0] + va[1] * vb[1] + va[2] * vb[2]).clamp(-1.0, 1.0);
    let omega = dot.acos();

    let mut points = Vec::with_capacity(segments + 1);
    let mut prev_lng = a.lng;
    for i in 0..=segments {
        let t = i as f64 / segments as f64;
        let p = if omega.abs() < 1e-12 {
            LatLng::new(a.lat + (b.lat - a.lat) * t, a.lng + (b.lng - a.lng) * t)
        } else {
            let sa = ((1.0 - t) * omega).sin() / omega.sin();
            let sb = (t * omega).sin() / omega.sin();
            from_vec([
                sa * va[0] + sb * vb[0],
                sa * va[1] + sb * vb[1],
                sa * va[2] + sb * vb[2],
            ])
        };
        let lng = unwrap_lng(p.lng, prev_lng);
        prev_lng = lng;
        points.push(LatLng::new(p.lat, lng));
    }
    points
}

/// project onto the unit web mercator square; x may leave [0, 1] for
/// unwrapped longitudes.
pub fn project(p: LatLng) -> (f64, f64) {
    let lat = p.lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    let x = (p.lng + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
    (x, y)
}

/// world width in pixels at zoom `z`.
pub fn world_size(z: u8) -> f64 {
    f64::from(TILE_SIZE) * 2f64.powi(i32::from(z))
}

/// largest zoom in [1, 18] where the points plus a 20% margin fit the canvas.
pub fn auto_zoom(points: &[LatLng], width: u32, height: u32) -> u8 {
    let projected: Vec<(f64, f64)> = points.iter().map(|&p| project(p)).collect();
    let span = |f: fn(&(f64, f64)) -> f64| {
        let min = projected.iter().map(f).fold(f64::INFINITY, f64::min);
        let max = projected.iter().map(f).fold(f64::NEG_INFINITY, f64::max);
        if max >= min { max - min } else { 0.0 }
    };
    let (span_x, span_y) = (span(|p| p.0), span(|p| p.1));

    (1..=18u8)
        .rev()
        .find(|&z| {
            let world = world_size(z);
            span_x * world * 1.2 <= f64::from(width) && span_y * world * 1.2 <= f64::from(height)
        })
        .unwrap_or(1)
}
