//! adif record parsing.
//!
//! records are split on `<eor>` and parsed independently; one bad record
//! never takes the rest of the file with it.

use std::collections::HashMap;
use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::{AdifError, RecordError};
use crate::qso::{QslStatus, Qso};

const EOR: &[u8] = b"<eor>";

/// read everything from `reader` and parse the records it contains.
pub fn parse<R: Read>(mut reader: R) -> Result<Vec<Qso>, AdifError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(AdifError::Read)?;
    Ok(parse_bytes(&buf))
}

/// parse an in-memory adif document. malformed records are skipped.
pub fn parse_bytes(input: &[u8]) -> Vec<Qso> {
    let mut qsos = Vec::new();
    for (index, chunk) in split_records(input).into_iter().enumerate() {
        if chunk.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match parse_record(chunk) {
            Ok(qso) => qsos.push(qso),
            Err(e) => tracing::debug!(record = index, error = %e, "skipping adif record"),
        }
    }
    qsos
}

/// split on case-insensitive `<eor>`; the trailing piece is kept.
fn split_records(input: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + EOR.len() <= input.len() {
        if input[i..i + EOR.len()].eq_ignore_ascii_case(EOR) {
            out.push(&input[start..i]);
            i += EOR.len();
            start = i;
        } else {
            i += 1;
        }
    }
    out.push(&input[start..]);
    out
}

/// collect `<name:len[:type]>value` fields of one record, keyed by uppercase name.
///
/// tags without a length (`<eoh>`) carry no value. everything before an
/// `<eoh>` is header and is dropped.
fn scan_fields(record: &[u8]) -> Result<HashMap<String, String>, RecordError> {
    let mut fields = HashMap::new();
    let mut pos = 0;

    while let Some(lt) = find(record, b'<', pos) {
        let Some(gt) = find(record, b'>', lt + 1) else {
            break;
        };
        let tag = String::from_utf8_lossy(&record[lt + 1..gt]);
        let mut parts = tag.splitn(3, ':');
        let name = parts.next().unwrap_or_default().trim().to_ascii_uppercase();
        pos = gt + 1;

        let Some(len) = parts.next() else {
            if name == "EOH" {
                fields.clear();
            }
            continue;
        };
        let len: usize = len.trim().parse().map_err(|_| RecordError::BadLength {
            field: name.clone(),
            len: len.to_string(),
        })?;

        let available = record.len() - pos;
        if available < len {
            return Err(RecordError::Truncated {
                field: name,
                len,
                available,
            });
        }
        let value = String::from_utf8_lossy(&record[pos..pos + len]).into_owned();
        pos += len;
        fields.insert(name, value);
    }

    Ok(fields)
}

fn find(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|p| p + from)
}

fn parse_timestamp(date: &str, time: &str) -> Result<DateTime<Utc>, RecordError> {
    let bad = || RecordError::BadTimestamp {
        date: date.to_string(),
        time: time.to_string(),
    };
    let numeric = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    if date.len() != 8 || !numeric(date) || !numeric(time) {
        return Err(bad());
    }
    let num = |s: &str| s.parse::<u32>().map_err(|_| bad());

    let day = NaiveDate::from_ymd_opt(
        date[0..4].parse::<i32>().map_err(|_| bad())?,
        num(&date[4..6])?,
        num(&date[6..8])?,
    )
    .ok_or_else(bad)?;

    let (h, m, s) = match time.len() {
        0 => (0, 0, 0),
        4 => (num(&time[0..2])?, num(&time[2..4])?, 0),
        6 => (num(&time[0..2])?, num(&time[2..4])?, num(&time[4..6])?),
        _ => return Err(bad()),
    };
    let clock = NaiveTime::from_hms_opt(h, m, s).ok_or_else(bad)?;

    Ok(day.and_time(clock).and_utc())
}

fn parse_record(record: &[u8]) -> Result<Qso, RecordError> {
    let mut fields = scan_fields(record)?;
    let mut take = |key: &str| fields.remove(key).unwrap_or_default();

    let call = take("CALL").trim().to_ascii_uppercase();
    if call.is_empty() {
        return Err(RecordError::MissingField("CALL"));
    }
    let date = take("QSO_DATE");
    if date.trim().is_empty() {
        return Err(RecordError::MissingField("QSO_DATE"));
    }
    let timestamp = parse_timestamp(date.trim(), take("TIME_ON").trim())?;

    Ok(Qso {
        call,
        timestamp,
        band: take("BAND"),
        mode: take("MODE"),
        freq: take("FREQ").trim().parse().ok(),
        rst_sent: take("RST_SENT"),
        rst_rcvd: take("RST_RCVD"),
        name: take("NAME"),
        qth: take("QTH"),
        country: take("COUNTRY"),
        dxcc: take("DXCC").trim().parse().ok(),
        gridsquare: take("GRIDSQUARE"),
        my_gridsquare: take("MY_GRIDSQUARE"),
        station_callsign: take("STATION_CALLSIGN"),
        tx_pwr: take("TX_PWR").trim().parse().ok(),
        comment: take("COMMENT"),
        qsl_sent: QslStatus::from_adif(&take("QSL_SENT")),
        qsl_rcvd: QslStatus::from_adif(&take("QSL_RCVD")),
        lotw_qsl_sent: QslStatus::from_adif(&take("LOTW_QSL_SENT")),
        lotw_qsl_rcvd: QslStatus::from_adif(&take("LOTW_QSL_RCVD")),
        qsl_via: take("QSL_VIA"),
    })
}
