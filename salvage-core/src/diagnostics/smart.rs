//! Text extraction for `smartctl` output.
//!
//! Only a handful of fields matter for the health score; everything else in the
//! output is ignored. All functions here are pure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

pub const UNKNOWN_HEALTH: &str = "UNKNOWN";
pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_ERRORS: &str = "no errors";
pub const UNAVAILABLE: &str = "unavailable";

static ERROR_ENTRY: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?m)^Error (\d+) (?:\[\d+\] )?occurred at disk power-on lifetime: (\d+) hours")
        .ok()
});
static ATA_ERROR_COUNT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?m)^ATA Error Count:\s+(\d+)").ok());

/// Reliability attributes that feed the health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SmartAttribute {
    #[serde(rename = "Reallocated_Sector_Ct")]
    ReallocatedSectorCt,
    #[serde(rename = "Current_Pending_Sector")]
    CurrentPendingSector,
    #[serde(rename = "Offline_Uncorrectable")]
    OfflineUncorrectable,
    #[serde(rename = "UDMA_CRC_Error_Count")]
    UdmaCrcErrorCount,
}

/// `{normal, warning, critical}` limits for an attribute's raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub normal: u64,
    pub warning: u64,
    pub critical: u64,
}

impl SmartAttribute {
    pub const ALL: [SmartAttribute; 4] = [
        SmartAttribute::ReallocatedSectorCt,
        SmartAttribute::CurrentPendingSector,
        SmartAttribute::OfflineUncorrectable,
        SmartAttribute::UdmaCrcErrorCount,
    ];

    /// Name as printed in the smartctl attribute table.
    pub fn name(&self) -> &'static str {
        match self {
            SmartAttribute::ReallocatedSectorCt => "Reallocated_Sector_Ct",
            SmartAttribute::CurrentPendingSector => "Current_Pending_Sector",
            SmartAttribute::OfflineUncorrectable => "Offline_Uncorrectable",
            SmartAttribute::UdmaCrcErrorCount => "UDMA_CRC_Error_Count",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.name() == name)
    }

    pub fn thresholds(&self) -> Thresholds {
        let (normal, warning, critical) = match self {
            SmartAttribute::ReallocatedSectorCt => (0, 10, 10),
            SmartAttribute::CurrentPendingSector => (0, 5, 5),
            SmartAttribute::OfflineUncorrectable => (0, 1, 1),
            SmartAttribute::UdmaCrcErrorCount => (0, 5, 5),
        };
        Thresholds {
            normal,
            warning,
            critical,
        }
    }
}

/// Fields extracted from the `smartctl -a` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryFields {
    pub overall_health: Option<String>,
    /// The tool stated outright that SMART is unavailable.
    pub explicitly_unsupported: bool,
    pub attributes: BTreeMap<SmartAttribute, u64>,
    pub temperature_c: Option<u64>,
    pub power_on_hours: Option<u64>,
}

/// Leading digits of a token, ignoring thousands separators (`"1,234"`, `"37 (Min/Max 20/45)"`).
fn leading_number(token: &str) -> Option<u64> {
    let digits: String = token
        .chars()
        .filter(|c| *c != ',')
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Leading word of a health verdict; failing drives print `FAILED!`.
fn health_token(value: &str) -> Option<String> {
    let token: String = value
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    (!token.is_empty()).then_some(token)
}

/// Value of a `Key:   value` line.
fn field_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.trim_start().strip_prefix(key))
        .map(str::trim)
}

/// Rows of the ATA attribute table as `(name, raw value)`.
///
/// `ID# ATTRIBUTE_NAME FLAG VALUE WORST THRESH TYPE UPDATED WHEN_FAILED RAW_VALUE`
fn attribute_rows(text: &str) -> impl Iterator<Item = (&str, u64)> {
    text.lines().filter_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || fields[0].parse::<u32>().is_err() || !fields[2].starts_with("0x")
        {
            return None;
        }
        Some((fields[1], leading_number(fields[9])?))
    })
}

pub fn parse_summary(text: &str) -> SummaryFields {
    let mut fields = SummaryFields::default();

    if let Some(value) = field_value(text, "SMART overall-health self-assessment test result:") {
        fields.overall_health = health_token(value);
    } else if let Some(value) = field_value(text, "SMART Health Status:") {
        // SAS/SCSI drives report "OK" instead of "PASSED".
        fields.overall_health = health_token(value).map(|token| {
            if token == "OK" {
                "PASSED".to_string()
            } else {
                token
            }
        });
    }

    fields.explicitly_unsupported = text.contains("does not support SMART")
        || field_value(text, "SMART support is:")
            .is_some_and(|value| value.starts_with("Unavailable"));

    let mut airflow_temp = None;
    for (name, raw) in attribute_rows(text) {
        if let Some(attr) = SmartAttribute::from_name(name) {
            fields.attributes.insert(attr, raw);
            continue;
        }
        match name {
            "Temperature_Celsius" => fields.temperature_c = Some(raw),
            "Airflow_Temperature_Cel" => airflow_temp = Some(raw),
            "Power_On_Hours" => fields.power_on_hours = Some(raw),
            _ => {}
        }
    }

    if fields.temperature_c.is_none() {
        fields.temperature_c = airflow_temp
            .or_else(|| field_value(text, "Temperature:").and_then(leading_number))
            .or_else(|| field_value(text, "Current Drive Temperature:").and_then(leading_number));
    }
    if fields.power_on_hours.is_none() {
        fields.power_on_hours = field_value(text, "Power On Hours:")
            .and_then(leading_number)
            .or_else(|| {
                field_value(text, "Accumulated power on time, hours:minutes")
                    .and_then(leading_number)
            });
    }

    fields
}

pub fn format_temperature(celsius: u64) -> String {
    format!("{}°C", celsius)
}

pub fn format_power_on_hours(hours: u64) -> String {
    format!("{} hours ({} days)", hours, hours / 24)
}

/// Summarize the `smartctl -l error` pass.
pub fn parse_error_log(text: &str) -> String {
    if text.contains("No Errors Logged") {
        return NO_ERRORS.to_string();
    }

    let entries: Vec<(u64, u64)> = ERROR_ENTRY
        .as_ref()
        .map(|re| {
            re.captures_iter(text)
                .filter_map(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?)))
                .collect()
        })
        .unwrap_or_default();

    let count = ATA_ERROR_COUNT
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .unwrap_or(entries.len() as u64);

    if count == 0 {
        return UNAVAILABLE.to_string();
    }
    // smartctl prints the most recent entry (highest number) first.
    match entries.iter().max_by_key(|(number, _)| *number) {
        Some((_, hours)) => format!("{} errors, latest at {} power-on hours", count, hours),
        None => format!("{} errors", count),
    }
}

/// SATA PHY event counters from the `smartctl -x` pass, summed per category.
///
/// Returns `None` when the drive has no PHY event table.
pub fn parse_sata_phy(text: &str) -> Option<BTreeMap<String, u64>> {
    let mut lines = text.lines();
    lines.find(|line| line.starts_with("SATA Phy Event Counters"))?;

    let mut counters: BTreeMap<String, u64> = BTreeMap::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        let mut parts = trimmed.split_whitespace();
        let (Some(id), Some(_size), Some(value)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if !id.starts_with("0x") {
            continue;
        }
        let Some(value) = leading_number(value) else {
            continue;
        };
        let description = parts.collect::<Vec<_>>().join(" ").to_ascii_lowercase();
        let key = if description.contains("r_err") {
            "R_ERR_Response"
        } else if description.contains("illegal state") {
            "Illegal_State"
        } else if description.contains("crc") && !description.contains("non-crc") {
            "CRC_Error_Count"
        } else {
            continue;
        };
        *counters.entry(key.to_string()).or_default() += value;
    }

    (!counters.is_empty()).then_some(counters)
}
