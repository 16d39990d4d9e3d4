use chrono::Utc;
use tracing::debug;

use crate::models::{Link, LinkState, LinkStatus};

/// Posts state transitions to a Discord-compatible webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Fire-and-forget; delivery never holds up the scan cycle.
    pub fn spawn_transition(&self, link: &Link, old: LinkState, status: &LinkStatus) {
        let payload = transition_payload(link, old, status);
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.http_client.post(&this.url).json(&payload).send().await {
                debug!("webhook delivery failed: {}", e);
            }
        });
    }
}

fn state_color(state: LinkState) -> u32 {
    match state {
        LinkState::Online => 0x2ECC71,
        LinkState::Degraded => 0xF39C12,
        LinkState::CriticalOutage => 0xE74C3C,
        LinkState::Unknown => 0x95A5A6,
    }
}

pub fn transition_payload(link: &Link, old: LinkState, status: &LinkStatus) -> serde_json::Value {
    let reason = status
        .last_error
        .map_or_else(|| "probe nominal".to_string(), |e| e.to_string());
    serde_json::json!({
        "username": "LinkPulse",
        "embeds": [{
            "title": "Link State Transition",
            "color": state_color(status.state),
            "fields": [
                { "name": "Link", "value": link.display_name(), "inline": true },
                { "name": "Client IP", "value": link.client_ip, "inline": true },
                { "name": "POP", "value": link.pop_name.as_deref().unwrap_or("--"), "inline": true },
                { "name": "Transition", "value": format!("{} \u{2192} {}", old, status.state), "inline": true },
                { "name": "Latency", "value": status.last_latency_ms.map_or("N/A".to_string(), |l| format!("{:.2}ms", l)), "inline": true },
                { "name": "Signal", "value": status.signal_dbm.map_or("N/A".to_string(), |s| format!("{}dBm", s)), "inline": true },
                { "name": "Reason", "value": reason, "inline": false }
            ],
            "timestamp": Utc::now().to_rfc3339(),
            "footer": { "text": "LinkPulse NOC" }
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeErrorKind;

    #[test]
    fn payload_names_transition_and_reason() {
        let link: Link = serde_json::from_str(
            r#"{ "link_id": "L-9", "name": "Gulshan-2", "client_ip": "10.9.0.9" }"#,
        )
        .unwrap();
        let mut status = LinkStatus::new("L-9");
        status.state = LinkState::CriticalOutage;
        status.last_error = Some(ProbeErrorKind::Timeout);

        let payload = transition_payload(&link, LinkState::Online, &status);
        let embed = &payload["embeds"][0];
        assert_eq!(embed["color"], 0xE74C3C);
        assert_eq!(embed["fields"][0]["value"], "Gulshan-2");
        assert_eq!(embed["fields"][3]["value"], "ONLINE \u{2192} CRITICAL_OUTAGE");
        assert_eq!(embed["fields"][6]["value"], "probe timeout");
    }
}
