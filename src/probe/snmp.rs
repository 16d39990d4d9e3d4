//! SNMP v2c device-health query
//!
//! Fetches the OIDs named by the link's [`VendorProfile`] and hands the raw
//! answers to the profile for decoding. The whole exchange (session setup and
//! every GET) shares one deadline.

use async_trait::async_trait;
use snmp2::{AsyncSession, Oid, Value};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;

use super::vendor::{HealthOid, RawHealth, RawValue};
use super::{HealthProbe, HealthTarget};
use crate::error::ProbeErrorKind;
use crate::models::HealthOutcome;

pub struct SnmpHealthProbe {
    port: u16,
}

impl SnmpHealthProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    fn destination(&self, address: &str) -> String {
        match address.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.port).to_string(),
            Err(_) => format!("{}:{}", address, self.port),
        }
    }

    async fn fetch(
        &self,
        address: &str,
        community: &str,
        oids: &[HealthOid],
    ) -> Result<RawHealth, ProbeErrorKind> {
        let destination = self.destination(address);
        let mut session = AsyncSession::new_v2c(&destination, community.as_bytes(), 0)
            .await
            .map_err(|e| {
                debug!("SNMP session to {} failed: {}", destination, e);
                ProbeErrorKind::Unreachable
            })?;

        let mut answers = Answers::default();
        for health_oid in oids {
            let Ok(oid) = Oid::from(health_oid.oid) else {
                answers.record(health_oid.field, Err(ProbeErrorKind::ProtocolError));
                continue;
            };
            let answer = match session.get(&oid).await {
                Ok(mut response) => Ok(response.varbinds.next().and_then(|(_, value)| convert(value))),
                Err(e) => {
                    debug!("SNMP GET {} on {} failed: {}", health_oid.field, destination, e);
                    Err(classify(&e.to_string()))
                }
            };
            answers.record(health_oid.field, answer);
        }
        answers.finish()
    }
}

/// Per-OID answers of one query. A device that only implements part of the
/// MIB still yields the fields it did answer.
#[derive(Default)]
struct Answers {
    raw: RawHealth,
    first_error: Option<ProbeErrorKind>,
}

impl Answers {
    fn record(&mut self, field: &'static str, answer: Result<Option<RawValue>, ProbeErrorKind>) {
        match answer {
            Ok(Some(value)) => self.raw.insert(field, value),
            Ok(None) => {}
            Err(reason) => {
                self.first_error.get_or_insert(reason);
            }
        }
    }

    fn finish(self) -> Result<RawHealth, ProbeErrorKind> {
        match self.first_error {
            Some(reason) if self.raw.is_empty() => Err(reason),
            _ => Ok(self.raw),
        }
    }
}

/// snmp2 reports failures through one error enum; the class is read from its message.
fn classify(message: &str) -> ProbeErrorKind {
    let message = message.to_lowercase();
    if message.contains("community") || message.contains("auth") {
        ProbeErrorKind::AuthError
    } else if message.contains("timed out") || message.contains("timeout") {
        ProbeErrorKind::Timeout
    } else if message.contains("refused") || message.contains("unreachable") || message.contains("socket") {
        ProbeErrorKind::Unreachable
    } else {
        ProbeErrorKind::ProtocolError
    }
}

fn convert(value: Value<'_>) -> Option<RawValue> {
    match value {
        Value::Integer(v) => Some(RawValue::Integer(v)),
        Value::Counter32(v) | Value::Unsigned32(v) | Value::Timeticks(v) => {
            Some(RawValue::Unsigned(u64::from(v)))
        }
        Value::Counter64(v) => Some(RawValue::Unsigned(v)),
        Value::OctetString(bytes) => {
            Some(RawValue::Text(String::from_utf8_lossy(bytes).trim().to_string()))
        }
        _ => None,
    }
}

#[async_trait]
impl HealthProbe for SnmpHealthProbe {
    async fn query(&self, target: HealthTarget<'_>, timeout: Duration) -> HealthOutcome {
        let Some(profile) = target.vendor.profile() else {
            return HealthOutcome::Skipped;
        };

        let fetched = tokio::time::timeout(
            timeout,
            self.fetch(target.address, target.community, profile.oids()),
        )
        .await;

        match fetched {
            Err(_) => HealthOutcome::Failed { reason: ProbeErrorKind::Timeout },
            Ok(Err(reason)) => HealthOutcome::Failed { reason },
            Ok(Ok(raw)) => match profile.decode(&raw) {
                Ok(counters) => HealthOutcome::Ok { counters },
                Err(reason) => HealthOutcome::Failed { reason },
            },
        }
    }
}
