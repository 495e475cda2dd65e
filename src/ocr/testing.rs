//! Scripted [`ReadService`] fake for unit tests.

use super::model::{OperationHandle, OperationStatus, ReadOperationResult};
use super::ReadService;
use crate::error::OcrError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Replays a fixed sequence of status responses, counting every call.
pub struct ScriptedService {
    submissions: Mutex<VecDeque<Result<OperationHandle, OcrError>>>,
    responses: Mutex<VecDeque<Result<ReadOperationResult, OcrError>>>,
    submits: AtomicUsize,
    queries: AtomicUsize,
}

impl ScriptedService {
    pub fn new(responses: Vec<Result<ReadOperationResult, OcrError>>) -> Self {
        Self {
            submissions: Mutex::new(VecDeque::new()),
            responses: Mutex::new(responses.into()),
            submits: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn statuses(statuses: &[OperationStatus]) -> Self {
        Self::new(
            statuses
                .iter()
                .map(|s| Ok(ReadOperationResult::with_status(*s)))
                .collect(),
        )
    }

    /// Script the submission replies; once exhausted, submits return `op-1`.
    pub fn with_submissions(self, submissions: Vec<Result<OperationHandle, OcrError>>) -> Self {
        *self.submissions.lock().unwrap() = submissions.into();
        self
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadService for ScriptedService {
    async fn submit(
        &self,
        _content: &[u8],
        _language: Option<&str>,
    ) -> Result<OperationHandle, OcrError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submissions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(OperationHandle::new("op-1")))
    }

    async fn fetch_result(
        &self,
        _handle: &OperationHandle,
    ) -> Result<ReadOperationResult, OcrError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted service ran out of responses")
    }
}
