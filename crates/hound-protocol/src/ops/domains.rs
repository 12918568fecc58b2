//! Domain listing types.

use serde::{Deserialize, Serialize};

/// One domain from `GET /api/v2/available-domains`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub domain_type: String,
    #[serde(default)]
    pub collected: bool,
    #[serde(rename = "impactValue", default)]
    pub impact_value: Option<i64>,
}
