//! maidenhead locators.

use std::fmt;
use std::str::FromStr;

use crate::error::LocatorError;
use crate::geo::LatLng;

/// a validated maidenhead locator of 4, 6 or 8 characters.
///
/// stored normalised: field letters upper case, subsquare letters lower case
/// (`FN31pr`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

/// (lng, lat) cell size in degrees for each precision pair.
const CELLS: [(f64, f64); 4] = [
    (20.0, 10.0),
    (2.0, 1.0),
    (2.0 / 24.0, 1.0 / 24.0),
    (2.0 / 240.0, 1.0 / 240.0),
];

impl Locator {
    pub fn parse(s: &str) -> Result<Self, LocatorError> {
        let s = s.trim();
        if !matches!(s.len(), 4 | 6 | 8) || !s.is_ascii() {
            return Err(LocatorError::Length(s.chars().count()));
        }

        let mut out = String::with_capacity(s.len());
        for (pos, ch) in s.chars().enumerate() {
            let ok = match pos {
                0 | 1 => matches!(ch.to_ascii_uppercase(), 'A'..='R'),
                4 | 5 => matches!(ch.to_ascii_uppercase(), 'A'..='X'),
                _ => ch.is_ascii_digit(),
            };
            if !ok {
                return Err(LocatorError::Character { ch, pos });
            }
            out.push(if pos < 4 {
                ch.to_ascii_uppercase()
            } else {
                ch.to_ascii_lowercase()
            });
        }
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// centre of the square.
    pub fn center(&self) -> LatLng {
        let b = self.0.as_bytes();
        let mut lng = -180.0;
        let mut lat = -90.0;
        let pairs = b.len() / 2;

        for (i, &(cell_lng, cell_lat)) in CELLS.iter().take(pairs).enumerate() {
            let (x, y) = (b[2 * i], b[2 * i + 1]);
            let (dx, dy) = match i {
                0 => (x - b'A', y - b'A'),
                2 => (x - b'a', y - b'a'),
                _ => (x - b'0', y - b'0'),
            };
            lng += f64::from(dx) * cell_lng;
            lat += f64::from(dy) * cell_lat;
        }

        let (cell_lng, cell_lat) = CELLS[pairs - 1];
        LatLng::new(lat + cell_lat / 2.0, lng + cell_lng / 2.0)
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn valid_locators_parse_inside_the_globe(s in "[A-Ra-r]{2}[0-9]{2}([A-Xa-x]{2})?") {
            let loc = Locator::parse(&s).unwrap();
            prop_assert!(loc.as_str().eq_ignore_ascii_case(&s));
            let c = loc.center();
            prop_assert!((-90.0..=90.0).contains(&c.lat));
            prop_assert!((-180.0..=180.0).contains(&c.lng));
        }

        #[test]
        fn odd_lengths_rejected(s in "[A-R0-9]{0,9}") {
            prop_assume!(!matches!(s.len(), 4 | 6 | 8));
            prop_assert!(Locator::parse(&s).is_err());
        }
    }
}
