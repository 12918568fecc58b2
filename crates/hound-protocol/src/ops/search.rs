//! Search endpoint types.

use serde::{Deserialize, Serialize};

/// One hit from `GET /api/v2/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    #[serde(default)]
    pub distinguishedname: Option<String>,
    pub objectid: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Envelope;

    #[test]
    fn test_parse_search() {
        let body = r#"{"data":[{"name":"JASPER@ABSALOM.ORG","distinguishedname":"CN=JASPER,DC=ABSALOM,DC=ORG","objectid":"S-1-5-21-1-1104","type":"User"}]}"#;
        let env: Envelope<Vec<SearchResult>> = serde_json::from_str(body).unwrap();
        assert_eq!(env.data[0].objectid, "S-1-5-21-1-1104");
        assert_eq!(env.data[0].kind, "User");
    }

    #[test]
    fn test_parse_search_without_dn() {
        let body = r#"{"data":[{"name":"tenant","objectid":"x","type":"AZTenant"}]}"#;
        let env: Envelope<Vec<SearchResult>> = serde_json::from_str(body).unwrap();
        assert!(env.data[0].distinguishedname.is_none());
    }
}
