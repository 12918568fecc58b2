//! Mock API Server
//!
//! In-process implementation of the graph API used by unit and integration
//! tests. It plugs into [`crate::transport::Transport`] as an
//! [`HttpBackend`](crate::transport::HttpBackend), so the full request path
//! (signing, headers, status handling) is exercised without a network.
//!
//! # Routes
//!
//! - `GET /api/version`: fixed version fixture
//! - `GET /api/v2/available-domains`: configured domains
//! - `GET /api/v2/search`: case-insensitive match over configured nodes
//! - `GET /api/v2/graphs/shortest-path`: configured path fixtures, else 404
//! - `POST /api/v2/file-upload/start`: open a job (ids start at 1)
//! - `POST /api/v2/file-upload/{id}`: accept a chunk into an open job (202)
//! - `POST /api/v2/file-upload/{id}/end`: close a job
//! - `GET /api/v2/file-upload`: job listing, advancing ended jobs one step

mod failure;
mod server;
mod state;

pub use failure::{FailureConfig, FailureInjector, FailureMode};
pub use server::{MockServer, Route, MOCK_TOKEN_ID, MOCK_TOKEN_KEY};
pub use state::{MockEvent, MockJob, MockState};
