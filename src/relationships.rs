//! Known graph relationship kinds
//!
//! Path queries pass an explicit allow-list of edge kinds to the server. The
//! list is versioned so that new edge kinds can be added as a new set without
//! changing query behavior for callers pinned to an older one.

use std::collections::BTreeSet;

/// Relationship kinds understood by the v2 graph API.
pub const RELATIONSHIPS_V1: &[&str] = &[
    "AddAllowedToAct",
    "AddKeyCredentialLink",
    "AddMember",
    "AddSelf",
    "AdminTo",
    "AllExtendedRights",
    "AllowedToAct",
    "AllowedToDelegate",
    "CanPSRemote",
    "CanRDP",
    "Contains",
    "DCSync",
    "DumpSMSAPassword",
    "ExecuteDCOM",
    "ForceChangePassword",
    "GenericAll",
    "GenericWrite",
    "GetChanges",
    "GetChangesAll",
    "GPLink",
    "HasSIDHistory",
    "HasSession",
    "MemberOf",
    "Owns",
    "ReadGMSAPassword",
    "ReadLAPSPassword",
    "SQLAdmin",
    "SyncLAPSPassword",
    "TrustedBy",
    "WriteAccountRestrictions",
    "WriteDacl",
    "WriteOwner",
];

/// A relationship allow-list after exclusions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipFilter {
    /// Kinds to send, in the order of the source set
    pub included: Vec<&'static str>,
    /// Excluded names that matched nothing in the source set
    pub unknown: Vec<String>,
}

/// Split a comma-separated exclusion list, dropping blanks
pub fn parse_exclusions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove `excluded` from `known`, comparing case-insensitively.
pub fn filter(known: &'static [&'static str], excluded: &[String]) -> RelationshipFilter {
    let excluded_lower: BTreeSet<String> = excluded.iter().map(|e| e.to_ascii_lowercase()).collect();

    let included = known
        .iter()
        .copied()
        .filter(|kind| !excluded_lower.contains(&kind.to_ascii_lowercase()))
        .collect();

    let mut unknown: Vec<String> = Vec::new();
    for name in excluded {
        let matched = known.iter().any(|k| k.eq_ignore_ascii_case(name));
        if !matched && !unknown.iter().any(|u| u.eq_ignore_ascii_case(name)) {
            unknown.push(name.clone());
        }
    }

    RelationshipFilter { included, unknown }
}
