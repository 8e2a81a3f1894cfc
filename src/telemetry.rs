//! Normalization of the hub's abbreviated device records.
//!
//! The hub wraps device state in a list keyed by device kind:
//!
//! ```text
//! {"eddi":[{"sno":14303955,"che":3.2,"sta":1,"gen":1200,"grd":-800,"div":400,"tim":"12:00:01","dat":"01-01-2024"}]}
//! ```
//!
//! The `cgi-jstatus-*` endpoint returns a list of such objects instead, one per kind.
//! Every missing or ill-typed field falls back to its default (0, or `"N/A"` for
//! `pst` and `pha`), so normalization never fails.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::Error;

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Eddi,
    Zappi,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 2] = [DeviceKind::Eddi, DeviceKind::Zappi];

    /// Key of the device list in hub payloads
    pub fn key(self) -> &'static str {
        match self {
            DeviceKind::Eddi => "eddi",
            DeviceKind::Zappi => "zappi",
        }
    }

    /// Letter prepended to the serial in endpoint paths
    pub fn serial_prefix(self) -> char {
        match self {
            DeviceKind::Eddi => 'E',
            DeviceKind::Zappi => 'Z',
        }
    }

    pub fn status_text(self, code: i64) -> String {
        let text = match (self, code) {
            (DeviceKind::Eddi, 0) => "Off",
            (DeviceKind::Eddi, 1) => "On",
            (DeviceKind::Eddi, 2 | 11) => "Heating",
            (DeviceKind::Eddi, 3 | 12) => "Diverting",
            (DeviceKind::Eddi, 4 | 13) => "Boosting",
            (DeviceKind::Eddi, 5 | 14) => "Complete",
            (DeviceKind::Eddi, 6 | 15) => "Error",
            (DeviceKind::Eddi, 7) => "Locked",
            (DeviceKind::Eddi, 8) => "Scheduled",
            (DeviceKind::Eddi, 9) => "Waiting",
            (DeviceKind::Eddi, 10) => "Ready",
            (DeviceKind::Zappi, 0) => "Disconnected",
            (DeviceKind::Zappi, 1) => "Connected",
            (DeviceKind::Zappi, 2 | 8) => "Waiting",
            (DeviceKind::Zappi, 3 | 10) => "Charging",
            (DeviceKind::Zappi, 4 | 11) => "Complete",
            (DeviceKind::Zappi, 5 | 12) => "Error",
            (DeviceKind::Zappi, 6) => "Locked",
            (DeviceKind::Zappi, 7) => "Scheduled",
            (DeviceKind::Zappi, 9) => "Ready",
            _ => return format!("Unknown ({})", code),
        };
        text.to_owned()
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DeviceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "eddi" => Ok(DeviceKind::Eddi),
            "zappi" => Ok(DeviceKind::Zappi),
            _ => Err(Error::Config(format!("unknown device kind \"{}\"", s))),
        }
    }
}

pub fn zappi_mode_text(mode: i64) -> String {
    match mode {
        1 => "Fast".to_owned(),
        2 => "Eco".to_owned(),
        3 => "Eco+".to_owned(),
        4 => "Stop".to_owned(),
        5 => "Manual".to_owned(),
        6 => "Schedule".to_owned(),
        7 => "Locked".to_owned(),
        8 => "Waiting".to_owned(),
        9 => "Ready".to_owned(),
        10 => "Charging".to_owned(),
        11 => "Complete".to_owned(),
        12 => "Error".to_owned(),
        _ => format!("Unknown ({})", mode),
    }
}

/// Accepts the expected type, or a string holding it; anything else becomes None.
fn lenient<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromStr,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(v) => serde_json::from_value(v).ok(),
        None => None,
    })
}

/// Whole numbers, also accepted as `1200.0` or `"-812.5"`; fractions round.
fn integer<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let round = |f: f64| f.is_finite().then(|| f.round() as i64);

    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(round)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(round))
        }
        _ => None,
    })
}

/// Numbers and strings both end up as text (`sno`, `pha`, `pst`).
fn text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct RawEddiRecord {
    #[serde(default, deserialize_with = "text")]
    pub sno: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub che: Option<f64>,
    #[serde(default, deserialize_with = "integer")]
    pub sta: Option<i64>,
    #[serde(default, deserialize_with = "integer")]
    pub gen: Option<i64>,
    #[serde(default, deserialize_with = "integer")]
    pub grd: Option<i64>,
    #[serde(default, deserialize_with = "integer")]
    pub div: Option<i64>,
    #[serde(default, deserialize_with = "text")]
    pub tim: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub dat: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct RawZappiRecord {
    #[serde(default, deserialize_with = "text")]
    pub sno: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub che: Option<f64>,
    #[serde(default, deserialize_with = "integer")]
    pub sta: Option<i64>,
    #[serde(default, deserialize_with = "integer")]
    pub zmo: Option<i64>,
    #[serde(default, deserialize_with = "text")]
    pub pst: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub pha: Option<String>,
    #[serde(default, deserialize_with = "integer")]
    pub gen: Option<i64>,
    #[serde(default, deserialize_with = "integer")]
    pub grd: Option<i64>,
    #[serde(default, deserialize_with = "integer")]
    pub div: Option<i64>,
    #[serde(default, deserialize_with = "text")]
    pub tim: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub dat: Option<String>,
}

/// One physical unit's record as sent by the hub
#[derive(Debug, Clone, PartialEq)]
pub enum RawDeviceRecord {
    Eddi(RawEddiRecord),
    Zappi(RawZappiRecord),
}

impl RawDeviceRecord {
    /// Decode a single record. A record that is not even an object decodes to all defaults.
    pub fn from_value(kind: DeviceKind, value: &Value) -> Self {
        fn decode<T: DeserializeOwned + Default>(kind: DeviceKind, value: &Value) -> T {
            T::deserialize(value).unwrap_or_else(|e| {
                warn!(%kind, error = %e, "undecodable device record, using defaults");
                T::default()
            })
        }

        match kind {
            DeviceKind::Eddi => RawDeviceRecord::Eddi(decode(kind, value)),
            DeviceKind::Zappi => RawDeviceRecord::Zappi(decode(kind, value)),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            RawDeviceRecord::Eddi(_) => DeviceKind::Eddi,
            RawDeviceRecord::Zappi(_) => DeviceKind::Zappi,
        }
    }

    pub fn into_reading(self) -> NormalizedReading {
        let kind = self.kind();
        match self {
            RawDeviceRecord::Eddi(r) => {
                let status_code = r.sta.unwrap_or_default();
                NormalizedReading {
                    device_kind: kind,
                    serial: r.sno,
                    charge_rate_kwh: r.che.unwrap_or_default(),
                    status_code,
                    status_text: kind.status_text(status_code),
                    timestamp: join_timestamp(r.tim, r.dat),
                    details: ReadingDetails::Eddi {
                        generation_w: r.gen.unwrap_or_default(),
                        grid_w: r.grd.unwrap_or_default(),
                        diverted_w: r.div.unwrap_or_default(),
                    },
                }
            }
            RawDeviceRecord::Zappi(r) => {
                let status_code = r.sta.unwrap_or_default();
                let mode = r.zmo.unwrap_or_default();
                NormalizedReading {
                    device_kind: kind,
                    serial: r.sno,
                    charge_rate_kwh: r.che.unwrap_or_default(),
                    status_code,
                    status_text: kind.status_text(status_code),
                    timestamp: join_timestamp(r.tim, r.dat),
                    details: ReadingDetails::Zappi {
                        mode,
                        mode_text: zappi_mode_text(mode),
                        plug_status: r.pst.unwrap_or_else(|| NOT_AVAILABLE.to_owned()),
                        phase: r.pha.unwrap_or_else(|| NOT_AVAILABLE.to_owned()),
                        charge_power_w: r.div.unwrap_or_default(),
                        generation_w: r.gen.unwrap_or_default(),
                        grid_w: r.grd.unwrap_or_default(),
                    },
                }
            }
        }
    }
}

fn join_timestamp(tim: Option<String>, dat: Option<String>) -> String {
    [tim, dat]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Device reading with named fields. Power in watts, energy in kWh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedReading {
    pub device_kind: DeviceKind,
    pub serial: Option<String>,
    pub charge_rate_kwh: f64,
    pub status_code: i64,
    pub status_text: String,
    /// `"<tim> <dat>"` as reported by the hub, empty if neither was sent
    pub timestamp: String,
    #[serde(flatten)]
    pub details: ReadingDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadingDetails {
    Eddi {
        generation_w: i64,
        grid_w: i64,
        diverted_w: i64,
    },
    Zappi {
        mode: i64,
        mode_text: String,
        plug_status: String,
        phase: String,
        charge_power_w: i64,
        generation_w: i64,
        grid_w: i64,
    },
}

impl NormalizedReading {
    /// Reading for a device the hub reported nothing for
    pub fn empty(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Eddi => RawDeviceRecord::Eddi(RawEddiRecord::default()),
            DeviceKind::Zappi => RawDeviceRecord::Zappi(RawZappiRecord::default()),
        }
        .into_reading()
    }
}

/// The list of records for `kind`, from either payload shape.
pub fn device_list(kind: DeviceKind, payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Object(map) => map.get(kind.key()).and_then(Value::as_array),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.get(kind.key()))
            .and_then(Value::as_array),
        _ => None,
    }
}

/// Normalize the first unit of `kind` in a hub payload.
/// No list, or an empty one, gives [`NormalizedReading::empty`].
pub fn normalize(kind: DeviceKind, payload: &Value) -> NormalizedReading {
    match device_list(kind, payload).and_then(|list| list.first()) {
        Some(record) => RawDeviceRecord::from_value(kind, record).into_reading(),
        None => NormalizedReading::empty(kind),
    }
}

/// Normalize every unit of `kind` in a hub payload.
pub fn normalize_all(kind: DeviceKind, payload: &Value) -> Vec<NormalizedReading> {
    device_list(kind, payload)
        .map(|list| {
            list.iter()
                .map(|record| RawDeviceRecord::from_value(kind, record).into_reading())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eddi_scenario() {
        let payload = json!({"eddi":[{"che":3.2,"sta":1,"tim":"12:00","dat":"01-01-2024"}]});
        let reading = normalize(DeviceKind::Eddi, &payload);

        assert_eq!(reading.device_kind, DeviceKind::Eddi);
        assert_eq!(reading.charge_rate_kwh, 3.2);
        assert_eq!(reading.status_code, 1);
        assert_eq!(reading.status_text, "On");
        assert_eq!(reading.timestamp, "12:00 01-01-2024");
        assert_eq!(
            reading.details,
            ReadingDetails::Eddi {
                generation_w: 0,
                grid_w: 0,
                diverted_w: 0
            }
        );
    }

    #[test]
    fn test_empty_list_gives_defaults() {
        let reading = normalize(DeviceKind::Zappi, &json!({"zappi": []}));

        assert_eq!(reading, NormalizedReading::empty(DeviceKind::Zappi));
        assert_eq!(reading.charge_rate_kwh, 0.0);
        assert_eq!(reading.status_code, 0);
        assert_eq!(reading.timestamp, "");
        match reading.details {
            ReadingDetails::Zappi { phase, plug_status, mode, .. } => {
                assert_eq!(phase, "N/A");
                assert_eq!(plug_status, "N/A");
                assert_eq!(mode, 0);
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_missing_kind_gives_defaults() {
        assert_eq!(
            normalize(DeviceKind::Eddi, &json!({"zappi": [{"che": 1.0}]})),
            NormalizedReading::empty(DeviceKind::Eddi)
        );
        assert_eq!(
            normalize(DeviceKind::Eddi, &json!("garbage")),
            NormalizedReading::empty(DeviceKind::Eddi)
        );
    }

    #[test]
    fn test_zappi_record() {
        let payload = json!({"zappi":[{
            "sno": 16186743, "che": 12.5, "sta": 3, "zmo": 2, "pst": "C2",
            "pha": 1, "div": 7200, "gen": 3000, "grd": 4300,
            "tim": "08:15:00", "dat": "02-03-2024"
        }]});
        let reading = normalize(DeviceKind::Zappi, &payload);

        assert_eq!(reading.serial.as_deref(), Some("16186743"));
        assert_eq!(reading.status_text, "Charging");
        assert_eq!(reading.timestamp, "08:15:00 02-03-2024");
        assert_eq!(
            reading.details,
            ReadingDetails::Zappi {
                mode: 2,
                mode_text: "Eco".into(),
                plug_status: "C2".into(),
                phase: "1".into(),
                charge_power_w: 7200,
                generation_w: 3000,
                grid_w: 4300,
            }
        );
    }

    #[test]
    fn test_all_devices_payload() {
        let payload = json!([
            {"eddi": [{"sno": 1, "che": 0.5}, {"sno": 2, "che": 1.5}]},
            {"zappi": [{"sno": 3, "zmo": 4}]},
            {"harvi": []},
            {"asn": "s18.myenergi.net"}
        ]);

        let eddis = normalize_all(DeviceKind::Eddi, &payload);
        assert_eq!(eddis.len(), 2);
        assert_eq!(eddis[1].charge_rate_kwh, 1.5);

        let zappi = normalize(DeviceKind::Zappi, &payload);
        assert_eq!(zappi.serial.as_deref(), Some("3"));
        assert!(matches!(zappi.details, ReadingDetails::Zappi { ref mode_text, .. } if mode_text == "Stop"));
    }

    #[test]
    fn test_lenient_fields() {
        let payload = json!({"eddi":[{"che": "2.5", "sta": [1], "gen": 10.7, "tim": "10:00"}]});
        let reading = normalize(DeviceKind::Eddi, &payload);

        assert_eq!(reading.charge_rate_kwh, 2.5);
        assert_eq!(reading.status_code, 0);
        assert_eq!(reading.timestamp, "10:00");
        assert!(matches!(reading.details, ReadingDetails::Eddi { generation_w: 11, .. }));

        let reading = normalize(DeviceKind::Eddi, &json!({"eddi": [42]}));
        assert_eq!(reading, NormalizedReading::empty(DeviceKind::Eddi));
    }

    #[test]
    fn test_float_watts_are_kept() {
        let payload = json!({"eddi":[{"gen": 1200.0, "grd": -812.5, "div": "400.0", "sta": 3.0}]});
        let reading = normalize(DeviceKind::Eddi, &payload);

        assert_eq!(reading.status_code, 3);
        assert_eq!(
            reading.details,
            ReadingDetails::Eddi {
                generation_w: 1200,
                grid_w: -813,
                diverted_w: 400
            }
        );

        let payload = json!({"zappi":[{"zmo": 2.0, "div": 7199.6}]});
        assert!(matches!(
            normalize(DeviceKind::Zappi, &payload).details,
            ReadingDetails::Zappi { mode: 2, charge_power_w: 7200, .. }
        ));
    }

    #[test]
    fn test_status_text() {
        assert_eq!(DeviceKind::Eddi.status_text(12), "Diverting");
        assert_eq!(DeviceKind::Zappi.status_text(99), "Unknown (99)");
        assert_eq!(zappi_mode_text(3), "Eco+");
        assert_eq!(zappi_mode_text(5), "Manual");
        assert_eq!(zappi_mode_text(12), "Error");
        assert_eq!(zappi_mode_text(13), "Unknown (13)");
    }

    #[test]
    fn test_serialized_shape() {
        let reading = normalize(DeviceKind::Eddi, &json!({"eddi":[{"che":3.2,"sta":1}]}));
        let v = serde_json::to_value(&reading).unwrap();

        assert_eq!(v["device_kind"], "eddi");
        assert_eq!(v["charge_rate_kwh"], 3.2);
        assert_eq!(v["diverted_w"], 0);
    }
}
