//! Package model and the numeric code tables of the buyer API

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Package count per status label
pub type Summary = IndexMap<String, u32>;

/// Status codes and labels, in display order
pub const PACKAGE_STATUSES: [(i64, &str); 7] = [
    (0, "Not Found"),
    (10, "In Transit"),
    (20, "Expired"),
    (30, "Ready to be Picked Up"),
    (35, "Undelivered"),
    (40, "Delivered"),
    (50, "Returned"),
];

const PACKAGE_TYPES: [(i64, &str); 4] = [
    (0, "Unknown"),
    (1, "Small Registered"),
    (2, "Small Unregistered"),
    (3, "Large Registered"),
];

// Partial; codes not listed render as "Unknown".
const COUNTRIES: [(i64, &str); 24] = [
    (0, "Unknown"),
    (115, "Austria"),
    (201, "Belgium"),
    (206, "Brazil"),
    (301, "China"),
    (302, "Canada"),
    (319, "Czech Republic"),
    (401, "Denmark"),
    (603, "Finland"),
    (604, "France"),
    (701, "Germany"),
    (703, "United Kingdom"),
    (801, "Hong Kong"),
    (901, "India"),
    (905, "Italy"),
    (1001, "Japan"),
    (1101, "South Korea"),
    (1403, "Netherlands"),
    (1503, "Poland"),
    (1901, "Spain"),
    (1902, "Sweden"),
    (1903, "Switzerland"),
    (2105, "United States"),
    (2801, "Taiwan"),
];

fn lookup(table: &[(i64, &'static str)], code: i64) -> &'static str {
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
        .unwrap_or("Unknown")
}

/// Label for a package status code
pub fn package_status(code: i64) -> &'static str {
    lookup(&PACKAGE_STATUSES, code)
}

/// Label for a package type code
pub fn package_type(code: i64) -> &'static str {
    lookup(&PACKAGE_TYPES, code)
}

/// Country name for a 17track country code
pub fn country_name(code: i64) -> &'static str {
    lookup(&COUNTRIES, code)
}

/// Summary with every known status at zero
pub(crate) fn empty_summary() -> Summary {
    PACKAGE_STATUSES
        .iter()
        .map(|(_, label)| (label.to_string(), 0))
        .collect()
}

/// A tracked package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Account-side id, used to edit the package
    pub id: String,
    pub tracking_number: String,
    pub friendly_name: Option<String>,
    pub status: String,
    /// Description of the latest tracking event
    pub info_text: Option<String>,
    pub location: String,
    /// Time of the latest tracking event, in the requested time zone
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub origin_country: String,
    pub destination_country: String,
    pub package_type: String,
    pub tracking_info_language: String,
    pub carrier: i64,
}

/// One row of `GetTrackInfoList`
#[derive(Debug, Deserialize)]
pub(crate) struct TrackInfo {
    #[serde(rename = "FTrackInfoId", deserialize_with = "string_or_number")]
    id: String,
    #[serde(rename = "FTrackNo")]
    tracking_number: String,
    #[serde(rename = "FRemark", default)]
    remark: Option<String>,
    #[serde(rename = "FLastEvent", default)]
    last_event: Option<String>,
    #[serde(rename = "FFirstCountry", default)]
    origin_country: i64,
    #[serde(rename = "FSecondCountry", default)]
    destination_country: i64,
    #[serde(rename = "FTrackStateType", default)]
    package_type: i64,
    #[serde(rename = "FPackageState", default)]
    status: i64,
    #[serde(rename = "FLang", default)]
    language: Option<String>,
    #[serde(rename = "FFirstCarrier", default)]
    carrier: i64,
}

/// The JSON document embedded in `FLastEvent`
#[derive(Debug, Default, Deserialize)]
struct LastEvent {
    /// Info text
    #[serde(default)]
    z: Option<String>,
    /// Timestamp, `%Y-%m-%d %H:%M` in UTC
    #[serde(default)]
    a: Option<String>,
    #[serde(default)]
    c: Option<String>,
    #[serde(default)]
    d: Option<String>,
}

impl LastEvent {
    fn parse(raw: Option<&str>) -> Self {
        match raw.filter(|s| !s.is_empty()) {
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                debug!("Ignoring malformed last event {:?}: {}", raw, e);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    fn location(&self) -> String {
        [&self.c, &self.d]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn timestamp(&self, tz: Tz) -> Option<DateTime<FixedOffset>> {
        let raw = self.a.as_deref()?;
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").ok()?;
        let local = tz.from_utc_datetime(&naive);
        Some(local.with_timezone(&local.offset().fix()))
    }
}

impl TrackInfo {
    pub(crate) fn tracking_number(&self) -> &str {
        &self.tracking_number
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn into_package(self, tz: Tz) -> Package {
        let event = LastEvent::parse(self.last_event.as_deref());
        Package {
            location: event.location(),
            timestamp: event.timestamp(tz),
            info_text: event.z.filter(|s| !s.is_empty()),
            id: self.id,
            tracking_number: self.tracking_number,
            friendly_name: self.remark.filter(|s| !s.is_empty()),
            status: package_status(self.status).to_string(),
            origin_country: country_name(self.origin_country).to_string(),
            destination_country: country_name(self.destination_country).to_string(),
            package_type: package_type(self.package_type).to_string(),
            tracking_info_language: self
                .language
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            carrier: self.carrier,
        }
    }
}

pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
