use serde::Deserialize;

use super::Prefix;

/// Wire-format envelope for a RIS-Live websocket frame: `{"type": ..., "data": ...}`.
#[derive(Debug, Deserialize)]
pub struct RisEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RisAnnouncement {
    next_hop: String,
    prefixes: Vec<String>,
}

/// The `data` payload of a `ris_message` frame, as RIPE RIS-Live emits it.
#[derive(Debug, Deserialize)]
struct RisMessageData {
    peer: String,
    #[serde(default)]
    announcements: Vec<RisAnnouncement>,
    #[serde(default)]
    withdrawals: Vec<String>,
    #[serde(default)]
    path: Vec<serde_json::Value>,
    #[serde(default)]
    community: Vec<(u32, u32)>,
    #[serde(default)]
    aggregator: Option<String>,
    timestamp: f64,
}

/// A single announcement within a `RawMessage`: a next-hop and the prefixes reached through it.
#[derive(Debug, Clone)]
pub struct Announcement {
    pub next_hop: String,
    pub prefixes: Vec<Prefix>,
}

/// The message kind distinguishing a route update from an upstream error notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Update,
    Error,
}

/// Normalized representation of one upstream BGP update, independent of the
/// websocket wire format it arrived in.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub kind: MessageKind,
    pub peer: String,
    pub announcements: Vec<Announcement>,
    pub withdrawals: Vec<Prefix>,
    pub as_path: Vec<u32>,
    pub communities: Vec<(u32, u32)>,
    pub aggregator: Option<String>,
    /// Milliseconds since the Unix epoch, as reported by the collector.
    pub timestamp_millis: i64,
}

impl RawMessage {
    /// The origin ASN: the last element of `as_path`, if any was reported.
    pub fn origin_asn(&self) -> Option<u32> {
        self.as_path.last().copied()
    }

    /// Parse a `ris_message` envelope's `data` field into a `RawMessage`.
    /// Malformed prefixes within the message are skipped (per-record, non-fatal);
    /// a structurally invalid payload is a `ParseError`.
    pub fn from_ris_message_data(data: serde_json::Value) -> Result<Self, crate::error::PipelineError> {
        let raw: RisMessageData = serde_json::from_value(data)?;
        let as_path = flatten_path(&raw.path);
        let announcements = raw
            .announcements
            .into_iter()
            .map(|a| Announcement {
                next_hop: a.next_hop,
                prefixes: a
                    .prefixes
                    .iter()
                    .filter_map(|p| Prefix::parse(p).ok())
                    .collect(),
            })
            .collect();
        let withdrawals = raw
            .withdrawals
            .iter()
            .filter_map(|p| Prefix::parse(p).ok())
            .collect();
        Ok(RawMessage {
            kind: MessageKind::Update,
            peer: raw.peer,
            announcements,
            withdrawals,
            as_path,
            communities: raw.community,
            aggregator: raw.aggregator,
            timestamp_millis: (raw.timestamp * 1000.0) as i64,
        })
    }
}

/// Flatten a RIS-Live AS-path, where confederation segments are nested arrays,
/// into a flat ASN sequence. The origin is the tail of the flattened sequence.
fn flatten_path(path: &[serde_json::Value]) -> Vec<u32> {
    let mut asns = Vec::with_capacity(path.len());
    for item in path {
        match item {
            serde_json::Value::Number(n) => {
                if let Some(asn) = n.as_u64() {
                    asns.push(asn as u32);
                }
            }
            serde_json::Value::Array(group) => {
                for member in group {
                    if let Some(asn) = member.as_u64() {
                        asns.push(asn as u32);
                    }
                }
            }
            _ => {}
        }
    }
    asns
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ris_message_data() {
        let data = json!({
            "peer": "192.0.2.1",
            "announcements": [{"next_hop": "192.0.2.1", "prefixes": ["5.5.5.0/24"]}],
            "withdrawals": [],
            "path": [3356, 500, 2914],
            "community": [[3356, 100]],
            "aggregator": "64512:192.0.2.1",
            "timestamp": 1_700_000_000.5,
        });
        let msg = RawMessage::from_ris_message_data(data).unwrap();
        assert_eq!(msg.peer, "192.0.2.1");
        assert_eq!(msg.as_path, vec![3356, 500, 2914]);
        assert_eq!(msg.origin_asn(), Some(2914));
        assert_eq!(msg.announcements.len(), 1);
        assert_eq!(msg.timestamp_millis, 1_700_000_000_500);
    }

    #[test]
    fn test_flatten_path_with_confederation_segment() {
        let path = vec![json!(100), json!([200, 201]), json!(300)];
        assert_eq!(flatten_path(&path), vec![100, 200, 201, 300]);
    }

    #[test]
    fn test_skips_unparsable_prefixes() {
        let data = json!({
            "peer": "p1",
            "announcements": [{"next_hop": "p1", "prefixes": ["not-a-prefix", "1.1.1.0/24"]}],
            "withdrawals": [],
            "path": [100],
            "timestamp": 0.0,
        });
        let msg = RawMessage::from_ris_message_data(data).unwrap();
        assert_eq!(msg.announcements[0].prefixes.len(), 1);
    }
}
