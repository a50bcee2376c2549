//! qso record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// state of a qsl confirmation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QslStatus {
    Yes,
    No,
    Requested,
    #[default]
    Unspecified,
}

impl QslStatus {
    /// parse an adif qsl flag. anything unknown is unspecified.
    pub fn from_adif(value: &str) -> Self {
        match value.trim() {
            "Y" | "y" => QslStatus::Yes,
            "N" | "n" => QslStatus::No,
            "R" | "r" => QslStatus::Requested,
            _ => QslStatus::Unspecified,
        }
    }

    /// the adif flag for this status; empty for unspecified.
    pub fn as_adif(&self) -> &'static str {
        match self {
            QslStatus::Yes => "Y",
            QslStatus::No => "N",
            QslStatus::Requested => "R",
            QslStatus::Unspecified => "",
        }
    }
}

/// a single logged contact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Qso {
    /// callsign of the other station, uppercased
    pub call: String,
    /// start of the contact (qso_date + time_on), utc
    pub timestamp: DateTime<Utc>,
    pub band: String,
    pub mode: String,
    /// frequency in mhz
    pub freq: Option<f64>,
    pub rst_sent: String,
    pub rst_rcvd: String,
    /// operator name
    pub name: String,
    pub qth: String,
    pub country: String,
    pub dxcc: Option<u32>,
    /// their maidenhead locator
    pub gridsquare: String,
    /// our maidenhead locator
    pub my_gridsquare: String,
    pub station_callsign: String,
    /// transmit power in watts
    pub tx_pwr: Option<f64>,
    pub comment: String,
    pub qsl_sent: QslStatus,
    pub qsl_rcvd: QslStatus,
    pub lotw_qsl_sent: QslStatus,
    pub lotw_qsl_rcvd: QslStatus,
    pub qsl_via: String,
}

impl Qso {
    /// true once a paper card has come back.
    pub fn has_paper_qsl(&self) -> bool {
        self.qsl_rcvd == QslStatus::Yes
    }
}
