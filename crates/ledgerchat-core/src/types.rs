use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Timestamp
// =============================================================================

/// Seconds since the Unix epoch, UTC.
///
/// Compared by value. Two Timestamps with the same inner value are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Whether `self` is strictly less than `days` old at `now`.
    pub fn is_within_days(&self, days: u32, now: Timestamp) -> bool {
        now.0 - self.0 < i64::from(days) * 86400
    }
}

// =============================================================================
// TenantCandidate
// =============================================================================

/// A company the signed-in user may work in, as returned by tenant discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantCandidate {
    pub tenancy_name: String,
    /// Backend tenant id. Some deployments send it as a number.
    #[serde(deserialize_with = "string_or_number")]
    pub tenant_id: String,
}

impl TenantCandidate {
    pub fn new(tenancy_name: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            tenancy_name: tenancy_name.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}
