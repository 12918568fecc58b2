//! Attack path query
//!
//! Resolves two object names through search, then asks the server for the
//! shortest path between them over every known relationship kind except the
//! excluded ones.

use std::fmt;

use hound_protocol::ops::path::GraphResponse;
use hound_protocol::ops::search::SearchResult;
use serde::Serialize;

use crate::client::{ApiClient, ApiError};
use crate::relationships::{self, RELATIONSHIPS_V1};
use crate::report::ExitCode;

/// Which end of the path a search was resolving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Start,
    End,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::End => write!(f, "end"),
        }
    }
}

/// Query errors
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("could not resolve {which} node: {source}")]
    Resolve {
        which: Endpoint,
        #[source]
        source: ApiError,
    },

    #[error("every relationship kind was excluded")]
    NothingToTraverse,

    #[error(transparent)]
    Path(ApiError),
}

impl QueryError {
    fn api(&self) -> Option<&ApiError> {
        match self {
            QueryError::Resolve { source, .. } => Some(source),
            QueryError::Path(source) => Some(source),
            QueryError::NothingToTraverse => None,
        }
    }

    /// True when the server answered but had nothing to return
    pub fn is_no_results(&self) -> bool {
        matches!(
            self.api(),
            Some(ApiError::NoResultsFound { .. }) | Some(ApiError::NoPathFound { .. })
        )
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.api() {
            None => ExitCode::Config,
            Some(ApiError::NoResultsFound { .. }) | Some(ApiError::NoPathFound { .. }) => ExitCode::NoResults,
            Some(e) if e.is_network() => ExitCode::Network,
            Some(_) => ExitCode::Aborted,
        }
    }
}

/// One edge of a resolved path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathHop {
    pub source: String,
    pub kind: String,
    pub target: String,
}

impl fmt::Display for PathHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.kind, self.target)
    }
}

/// A resolved attack path
#[derive(Debug, Clone, Serialize)]
pub struct AttackPath {
    pub start: SearchResult,
    pub end: SearchResult,
    pub relationship_kinds: Vec<String>,
    pub hops: Vec<PathHop>,
}

impl AttackPath {
    /// One line per hop
    pub fn render(&self) -> String {
        self.hops.iter().map(|h| h.to_string()).collect::<Vec<_>>().join("\n")
    }
}

/// Pick the search result whose name matches `name` exactly (ignoring
/// case), falling back to the first result.
pub fn best_match<'r>(name: &str, results: &'r [SearchResult]) -> Option<&'r SearchResult> {
    results
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(name))
        .or_else(|| results.first())
}

fn resolve(client: &ApiClient, name: &str, which: Endpoint) -> Result<SearchResult, QueryError> {
    let results = client
        .search(name)
        .map_err(|source| QueryError::Resolve { which, source })?;
    let chosen = best_match(name, &results).cloned().ok_or_else(|| QueryError::Resolve {
        which,
        source: ApiError::NoResultsFound { query: name.to_string() },
    })?;
    if results.len() > 1 {
        tracing::debug!(%which, query = name, matches = results.len(), chosen = %chosen.name, "search returned several nodes");
    }
    Ok(chosen)
}

/// Turn a graph response into labelled hops; unknown node indices fall
/// back to the raw index.
pub fn hops(graph: &GraphResponse) -> Vec<PathHop> {
    graph
        .edges
        .iter()
        .map(|edge| PathHop {
            source: graph.label(&edge.source).unwrap_or(&edge.source).to_string(),
            kind: edge.kind.clone(),
            target: graph.label(&edge.target).unwrap_or(&edge.target).to_string(),
        })
        .collect()
}

/// Find the shortest path from `start_name` to `end_name`.
///
/// `excluded` names relationship kinds to leave out; names that are not
/// known relationship kinds are ignored with a warning.
pub fn query_attack_path(
    client: &ApiClient,
    start_name: &str,
    end_name: &str,
    excluded: &[String],
) -> Result<AttackPath, QueryError> {
    let filter = relationships::filter(RELATIONSHIPS_V1, excluded);
    for name in &filter.unknown {
        tracing::warn!(relationship = %name, "ignoring unknown relationship kind in exclusions");
    }
    if filter.included.is_empty() {
        return Err(QueryError::NothingToTraverse);
    }

    let start = resolve(client, start_name, Endpoint::Start)?;
    let end = resolve(client, end_name, Endpoint::End)?;
    tracing::info!(start = %start.objectid, end = %end.objectid, kinds = filter.included.len(), "querying shortest path");

    let graph = client
        .shortest_path(&start.objectid, &end.objectid, &filter.included)
        .map_err(QueryError::Path)?;

    Ok(AttackPath {
        hops: hops(&graph),
        relationship_kinds: filter.included.iter().map(|k| k.to_string()).collect(),
        start,
        end,
    })
}
