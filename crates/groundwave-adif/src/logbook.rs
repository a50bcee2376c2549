//! an in-memory logbook and the queries the qsl pages run against it.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use chrono::{DateTime, Duration, Utc};

use crate::error::AdifError;
use crate::parser;
use crate::qso::Qso;

/// parsed qsos plus query helpers.
#[derive(Debug, Clone, Default)]
pub struct Logbook {
    qsos: Vec<Qso>,
}

impl Logbook {
    /// wrap already-parsed qsos.
    pub fn new(qsos: Vec<Qso>) -> Self {
        Self { qsos }
    }

    /// read and parse an adif document.
    pub fn parse<R: Read>(reader: R) -> Result<Self, AdifError> {
        Ok(Self::new(parser::parse(reader)?))
    }

    pub fn qsos(&self) -> &[Qso] {
        &self.qsos
    }

    pub fn into_qsos(self) -> Vec<Qso> {
        self.qsos
    }

    pub fn len(&self) -> usize {
        self.qsos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qsos.is_empty()
    }

    /// qsos with `call` (case-insensitive) within `tolerance_minutes` of `time`.
    pub fn search(&self, call: &str, time: DateTime<Utc>, tolerance_minutes: i64) -> Vec<&Qso> {
        let tolerance = Duration::minutes(tolerance_minutes.abs());
        self.qsos
            .iter()
            .filter(|q| q.call.eq_ignore_ascii_case(call.trim()))
            .filter(|q| (q.timestamp - time).abs() <= tolerance)
            .collect()
    }

    /// the `n` most recent qsos, newest first.
    pub fn latest_qsos(&self, n: usize) -> Vec<&Qso> {
        let mut sorted: Vec<&Qso> = self.qsos.iter().collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted.truncate(n);
        sorted
    }

    /// distinct non-empty country names, sorted.
    pub fn unique_countries(&self) -> Vec<String> {
        self.qsos
            .iter()
            .map(|q| q.country.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// one qso per call with a received paper card, sorted by call.
    ///
    /// when a call has several confirmed qsos the first one carrying an
    /// operator name is kept.
    pub fn paper_qsl_hall_of_fame(&self) -> Vec<&Qso> {
        let mut by_call: BTreeMap<&str, &Qso> = BTreeMap::new();
        for q in self.qsos.iter().filter(|q| q.has_paper_qsl()) {
            by_call
                .entry(q.call.as_str())
                .and_modify(|kept| {
                    if kept.name.trim().is_empty() && !q.name.trim().is_empty() {
                        *kept = q;
                    }
                })
                .or_insert(q);
        }
        by_call.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qso::QslStatus;
    use chrono::TimeZone;

    fn qso(call: &str, minute: u32, country: &str, name: &str, rcvd: QslStatus) -> Qso {
        Qso {
            call: call.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
            country: country.to_string(),
            name: name.to_string(),
            qsl_rcvd: rcvd,
            ..Default::default()
        }
    }

    fn book() -> Logbook {
        Logbook::new(vec![
            qso("K1AB", 0, "United States", "", QslStatus::Yes),
            qso("DL2XY", 10, "Germany", "Hans", QslStatus::No),
            qso("K1AB", 20, "United States", "Ann", QslStatus::Yes),
            qso("JA1ZZ", 30, "", "", QslStatus::Yes),
            qso("K1AB", 40, "United States", "Annie", QslStatus::Yes),
        ])
    }

    #[test]
    fn test_search_with_tolerance() {
        let b = book();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 15, 0).unwrap();
        let hits = b.search("k1ab", t, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Ann");
        assert_eq!(b.search("K1AB", t, 15).len(), 2);
        assert!(b.search("N0NE", t, 1000).is_empty());
    }

    #[test]
    fn test_latest_qsos() {
        let b = book();
        let latest = b.latest_qsos(2);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].name, "Annie");
        assert_eq!(latest[1].call, "JA1ZZ");
        assert_eq!(b.latest_qsos(50).len(), 5);
    }

    #[test]
    fn test_unique_countries() {
        assert_eq!(
            book().unique_countries(),
            vec!["Germany".to_string(), "United States".to_string()]
        );
    }

    #[test]
    fn test_hall_of_fame_prefers_named() {
        let b = book();
        let fame = b.paper_qsl_hall_of_fame();
        let calls: Vec<&str> = fame.iter().map(|q| q.call.as_str()).collect();
        assert_eq!(calls, vec!["JA1ZZ", "K1AB"]);
        assert_eq!(fame[1].name, "Ann");
    }
}
