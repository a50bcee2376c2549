//! adif export.

use std::io::Write;

use crate::error::AdifError;
use crate::qso::Qso;

/// adif version announced in exported headers.
pub const ADIF_VERSION: &str = "3.1.4";

/// program id announced in exported headers.
pub const PROGRAM_ID: &str = "groundwave";

fn field(out: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    // lengths are byte counts
    out.push_str(&format!("<{}:{}>{}", name, value.len(), value));
}

/// render one qso as an `<eor>`-terminated record. empty fields are omitted.
pub fn format_record(q: &Qso) -> String {
    let mut out = String::new();
    field(&mut out, "CALL", &q.call);
    field(&mut out, "QSO_DATE", &q.timestamp.format("%Y%m%d").to_string());
    field(&mut out, "TIME_ON", &q.timestamp.format("%H%M%S").to_string());
    field(&mut out, "BAND", &q.band);
    field(&mut out, "MODE", &q.mode);
    if let Some(freq) = q.freq {
        field(&mut out, "FREQ", &freq.to_string());
    }
    field(&mut out, "RST_SENT", &q.rst_sent);
    field(&mut out, "RST_RCVD", &q.rst_rcvd);
    field(&mut out, "NAME", &q.name);
    field(&mut out, "QTH", &q.qth);
    field(&mut out, "COUNTRY", &q.country);
    if let Some(dxcc) = q.dxcc {
        field(&mut out, "DXCC", &dxcc.to_string());
    }
    field(&mut out, "GRIDSQUARE", &q.gridsquare);
    field(&mut out, "MY_GRIDSQUARE", &q.my_gridsquare);
    field(&mut out, "STATION_CALLSIGN", &q.station_callsign);
    if let Some(pwr) = q.tx_pwr {
        field(&mut out, "TX_PWR", &pwr.to_string());
    }
    field(&mut out, "COMMENT", &q.comment);
    field(&mut out, "QSL_SENT", q.qsl_sent.as_adif());
    field(&mut out, "QSL_RCVD", q.qsl_rcvd.as_adif());
    field(&mut out, "LOTW_QSL_SENT", q.lotw_qsl_sent.as_adif());
    field(&mut out, "LOTW_QSL_RCVD", q.lotw_qsl_rcvd.as_adif());
    field(&mut out, "QSL_VIA", &q.qsl_via);
    out.push_str("<EOR>\n");
    out
}

/// write a complete adif document: header, then one record per qso.
pub fn write_adif<'a, W, I>(qsos: I, mut writer: W) -> Result<(), AdifError>
where
    W: Write,
    I: IntoIterator<Item = &'a Qso>,
{
    let mut header = String::from("groundwave logbook export\n");
    field(&mut header, "ADIF_VER", ADIF_VERSION);
    header.push('\n');
    field(&mut header, "PROGRAMID", PROGRAM_ID);
    header.push_str("\n<EOH>\n");
    writer
        .write_all(header.as_bytes())
        .map_err(AdifError::Write)?;

    for q in qsos {
        writer
            .write_all(format_record(q).as_bytes())
            .map_err(AdifError::Write)?;
    }
    writer.flush().map_err(AdifError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::qso::QslStatus;
    use chrono::{TimeZone, Utc};

    fn sample() -> Vec<Qso> {
        vec![
            Qso {
                call: "JA1XYZ".to_string(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 13, 5, 1).unwrap(),
                band: "20m".to_string(),
                mode: "FT8".to_string(),
                freq: Some(14.074),
                rst_sent: "-10".to_string(),
                rst_rcvd: "-12".to_string(),
                name: "Tarō".to_string(),
                country: "Japan".to_string(),
                dxcc: Some(339),
                gridsquare: "PM95vq".to_string(),
                my_gridsquare: "FN31pr".to_string(),
                qsl_rcvd: QslStatus::Yes,
                qsl_sent: QslStatus::Requested,
                ..Default::default()
            },
            Qso {
                call: "G4ABC".to_string(),
                timestamp: Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap(),
                band: "40m".to_string(),
                mode: "CW".to_string(),
                tx_pwr: Some(5.0),
                comment: "nice fist, 73 <3".to_string(),
                lotw_qsl_rcvd: QslStatus::No,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_header() {
        let mut out = Vec::new();
        write_adif(&Vec::<Qso>::new(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<ADIF_VER:5>3.1.4"));
        assert!(text.contains("<PROGRAMID:10>groundwave"));
        assert!(text.contains("<EOH>"));
    }

    #[test]
    fn test_export_then_parse() {
        let qsos = sample();
        let mut out = Vec::new();
        write_adif(&qsos, &mut out).unwrap();

        let parsed = parse(out.as_slice()).unwrap();
        assert_eq!(parsed, qsos);
    }

    #[test]
    fn test_lengths_are_bytes() {
        let record = format_record(&sample()[0]);
        assert!(record.contains("<NAME:5>Tarō"), "{}", record);
        assert!(!record.contains("QTH"));
    }
}
