//! Mock API server state
//!
//! Jobs, graph fixtures, and the event log the mock server keeps.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use hound_protocol::ops::path::GraphResponse;
use hound_protocol::ops::search::SearchResult;
use hound_protocol::ops::upload::FileUploadJob;
use hound_protocol::JobStatus;
use serde_json::Value;

/// Something the server observed, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    JobStarted(i64),
    /// Chunk with `count` records accepted into `job_id`
    ChunkAccepted { job_id: i64, count: u64 },
    JobEnded(i64),
    JobsListed,
}

/// A file-upload job as the mock server tracks it
#[derive(Debug, Clone)]
pub struct MockJob {
    pub id: i64,
    pub status: JobStatus,
    pub status_message: String,
    /// Record count of every accepted chunk
    pub chunks: Vec<u64>,
    /// Whether writes are still accepted
    pub open: bool,
    /// Statuses still to be reported, one per listing
    pub progression: VecDeque<JobStatus>,
}

impl MockJob {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            status_message: String::new(),
            chunks: Vec::new(),
            open: true,
            progression: VecDeque::new(),
        }
    }

    /// Close for writes and queue the statuses to report afterwards
    pub fn end(&mut self, progression: Vec<JobStatus>) {
        self.open = false;
        self.progression = progression.into();
    }

    /// Advance one listing step; the last status sticks
    pub fn advance(&mut self) {
        if self.open {
            return;
        }
        if let Some(next) = self.progression.pop_front() {
            self.status = next;
            self.status_message = match next {
                JobStatus::Complete => "Complete".to_string(),
                JobStatus::Ingesting => "Ingesting".to_string(),
                other => other.to_string(),
            };
        }
    }

    pub fn listing(&self) -> FileUploadJob {
        FileUploadJob {
            id: self.id,
            status: self.status,
            status_message: self.status_message.clone(),
        }
    }
}

/// Mock server state container
#[derive(Debug)]
pub struct MockState {
    pub jobs: BTreeMap<i64, MockJob>,
    pub domains: Vec<Value>,
    pub nodes: Vec<SearchResult>,
    /// Shortest-path fixtures keyed by (start, end) object id
    pub paths: HashMap<(String, String), GraphResponse>,
    /// Relationship kinds of the most recent shortest-path request
    pub last_relationship_kinds: Option<Vec<String>>,
    /// Statuses a job reports after it is ended, unless overridden
    pub default_progression: Vec<JobStatus>,
    /// Per-job overrides of `default_progression`
    pub progressions: HashMap<i64, Vec<JobStatus>>,
    /// Job ids left out of every listing, whether or not they exist yet
    pub hidden: HashSet<i64>,
    pub events: Vec<MockEvent>,
    next_job_id: i64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            jobs: BTreeMap::new(),
            domains: Vec::new(),
            nodes: Vec::new(),
            paths: HashMap::new(),
            last_relationship_kinds: None,
            default_progression: vec![JobStatus::Ingesting, JobStatus::Complete],
            progressions: HashMap::new(),
            hidden: HashSet::new(),
            events: Vec::new(),
            next_job_id: 1,
        }
    }
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a job and return its id
    pub fn start_job(&mut self) -> i64 {
        let id = self.next_job_id;
        self.next_job_id += 1;
        self.jobs.insert(id, MockJob::new(id));
        self.events.push(MockEvent::JobStarted(id));
        id
    }

    /// Close a job; false when it does not exist or is already closed
    pub fn end_job(&mut self, id: i64) -> bool {
        let progression = self
            .progressions
            .get(&id)
            .cloned()
            .unwrap_or_else(|| self.default_progression.clone());
        match self.jobs.get_mut(&id) {
            Some(job) if job.open => {
                job.end(progression);
                self.events.push(MockEvent::JobEnded(id));
                true
            }
            _ => false,
        }
    }

    /// Record a chunk; false when the job is not open
    pub fn accept_chunk(&mut self, id: i64, count: u64) -> bool {
        match self.jobs.get_mut(&id) {
            Some(job) if job.open => {
                job.chunks.push(count);
                self.events.push(MockEvent::ChunkAccepted { job_id: id, count });
                true
            }
            _ => false,
        }
    }

    /// Visible jobs, most recent first, each advanced one step
    pub fn list_jobs(&mut self) -> Vec<FileUploadJob> {
        self.events.push(MockEvent::JobsListed);
        let hidden = &self.hidden;
        self.jobs
            .values_mut()
            .rev()
            .filter(|job| !hidden.contains(&job.id))
            .map(|job| {
                job.advance();
                job.listing()
            })
            .collect()
    }

    /// Case-insensitive substring search over node names
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        let needle = query.to_lowercase();
        self.nodes
            .iter()
            .filter(|n| n.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}
