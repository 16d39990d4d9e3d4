//! Vendor-specific health decoding
//!
//! Each supported radio family is a [`VendorProfile`]: the OIDs to fetch and
//! how to turn the raw answers into [`HealthCounters`]. The profile is picked
//! from the link's vendor field, falling back to the device model.

use std::collections::BTreeMap;

use crate::error::ProbeErrorKind;
use crate::models::{Duplex, HealthCounters};

/// IF-MIB ifSpeed of interface 1, in bits per second.
pub const OID_IF_SPEED: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 5, 1];
/// EtherLike-MIB dot3StatsDuplexStatus of interface 1.
pub const OID_DUPLEX_STATUS: &[u64] = &[1, 3, 6, 1, 2, 1, 10, 7, 2, 1, 19, 1];
/// Cambium ePMP downlink RSSI.
pub const OID_CAMBIUM_RSSI: &[u64] = &[1, 3, 6, 1, 4, 1, 17713, 21, 1, 2, 1, 0];
/// Ubiquiti airMAX station signal.
pub const OID_UBIQUITI_SIGNAL: &[u64] = &[1, 3, 6, 1, 4, 1, 41112, 1, 4, 5, 1, 5, 1];

pub const FIELD_IF_SPEED: &str = "if_speed";
pub const FIELD_DUPLEX: &str = "duplex";
pub const FIELD_SIGNAL: &str = "signal";

#[derive(Debug, Clone, Copy)]
pub struct HealthOid {
    pub field: &'static str,
    pub oid: &'static [u64],
}

/// A decoded SNMP varbind value, detached from the response buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Integer(i64),
    Unsigned(u64),
    Text(String),
}

impl RawValue {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Unsigned(v) => i64::try_from(*v).ok(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Raw answers of one health query, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct RawHealth {
    values: BTreeMap<&'static str, RawValue>,
}

impl RawHealth {
    pub fn insert(&mut self, field: &'static str, value: RawValue) {
        self.values.insert(field, value);
    }

    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.values.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub trait VendorProfile: Send + Sync {
    fn name(&self) -> &'static str;

    fn oids(&self) -> &'static [HealthOid];

    fn decode(&self, raw: &RawHealth) -> Result<HealthCounters, ProbeErrorKind>;
}

/// Fields every profile reads: Ethernet speed and duplex of port 1.
fn decode_ethernet(raw: &RawHealth) -> Result<HealthCounters, ProbeErrorKind> {
    if raw.is_empty() {
        return Err(ProbeErrorKind::ProtocolError);
    }
    let speed_mbps = raw
        .get(FIELD_IF_SPEED)
        .and_then(RawValue::as_i64)
        .filter(|bps| *bps > 0)
        .map(|bps| bps as u64 / 1_000_000);
    let duplex = match raw.get(FIELD_DUPLEX).and_then(RawValue::as_i64) {
        Some(2) => Duplex::Half,
        Some(3) => Duplex::Full,
        _ => Duplex::Unknown,
    };
    Ok(HealthCounters {
        speed_mbps,
        duplex,
        ..HealthCounters::default()
    })
}

/// Radios report 0 when no signal reading is available.
fn decode_signal(raw: &RawHealth) -> Option<i32> {
    raw.get(FIELD_SIGNAL)
        .and_then(RawValue::as_i64)
        .filter(|dbm| *dbm != 0)
        .and_then(|dbm| i32::try_from(dbm).ok())
}

pub struct Cambium;

impl VendorProfile for Cambium {
    fn name(&self) -> &'static str {
        "cambium"
    }

    fn oids(&self) -> &'static [HealthOid] {
        const OIDS: &[HealthOid] = &[
            HealthOid { field: FIELD_SIGNAL, oid: OID_CAMBIUM_RSSI },
            HealthOid { field: FIELD_IF_SPEED, oid: OID_IF_SPEED },
            HealthOid { field: FIELD_DUPLEX, oid: OID_DUPLEX_STATUS },
        ];
        OIDS
    }

    fn decode(&self, raw: &RawHealth) -> Result<HealthCounters, ProbeErrorKind> {
        let mut counters = decode_ethernet(raw)?;
        counters.signal_dbm = decode_signal(raw);
        // ePMP firmware leaves the EtherLike table empty; its LAN port is full duplex.
        if counters.speed_mbps.is_some() && counters.duplex == Duplex::Unknown {
            counters.duplex = Duplex::Full;
        }
        counters.fields.insert("vendor".into(), self.name().into());
        Ok(counters)
    }
}

pub struct Ubiquiti;

impl VendorProfile for Ubiquiti {
    fn name(&self) -> &'static str {
        "ubiquiti"
    }

    fn oids(&self) -> &'static [HealthOid] {
        const OIDS: &[HealthOid] = &[
            HealthOid { field: FIELD_SIGNAL, oid: OID_UBIQUITI_SIGNAL },
            HealthOid { field: FIELD_IF_SPEED, oid: OID_IF_SPEED },
            HealthOid { field: FIELD_DUPLEX, oid: OID_DUPLEX_STATUS },
        ];
        OIDS
    }

    fn decode(&self, raw: &RawHealth) -> Result<HealthCounters, ProbeErrorKind> {
        let mut counters = decode_ethernet(raw)?;
        counters.signal_dbm = decode_signal(raw);
        counters.fields.insert("vendor".into(), self.name().into());
        Ok(counters)
    }
}

/// Plain MIB-II device without a radio.
pub struct Generic;

impl VendorProfile for Generic {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn oids(&self) -> &'static [HealthOid] {
        const OIDS: &[HealthOid] = &[
            HealthOid { field: FIELD_IF_SPEED, oid: OID_IF_SPEED },
            HealthOid { field: FIELD_DUPLEX, oid: OID_DUPLEX_STATUS },
        ];
        OIDS
    }

    fn decode(&self, raw: &RawHealth) -> Result<HealthCounters, ProbeErrorKind> {
        decode_ethernet(raw)
    }
}

static CAMBIUM: Cambium = Cambium;
static UBIQUITI: Ubiquiti = Ubiquiti;
static GENERIC: Generic = Generic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Cambium,
    Ubiquiti,
    Generic,
    Unsupported,
}

impl Vendor {
    pub fn detect(vendor: Option<&str>, model: Option<&str>) -> Self {
        [vendor, model]
            .into_iter()
            .flatten()
            .map(Self::from_label)
            .find(|v| *v != Self::Unsupported)
            .unwrap_or(Self::Unsupported)
    }

    fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("cambium") || label.contains("epmp") {
            Self::Cambium
        } else if ["ubiquiti", "powerbeam", "nano", "airmax"]
            .iter()
            .any(|k| label.contains(k))
        {
            Self::Ubiquiti
        } else if label.contains("generic") || label.contains("snmp") {
            Self::Generic
        } else {
            Self::Unsupported
        }
    }

    pub fn profile(self) -> Option<&'static dyn VendorProfile> {
        match self {
            Self::Cambium => Some(&CAMBIUM),
            Self::Ubiquiti => Some(&UBIQUITI),
            Self::Generic => Some(&GENERIC),
            Self::Unsupported => None,
        }
    }
}
