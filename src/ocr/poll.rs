//! Drive a recognition operation to a terminal status.
//!
//! Query, and if the job is neither `succeeded` nor `failed`, wait and query
//! again. Queued and running states are treated alike. A failing status query
//! aborts the loop immediately.

use super::model::{OperationHandle, OperationStatus, ReadOperationResult};
use super::ReadService;
use crate::config::PollSchedule;
use crate::error::OcrError;
use crate::progress::ProgressCallback;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How a poll ended, short of a transport error.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The operation succeeded; carries the full payload.
    Succeeded(ReadOperationResult),
    /// The operation reached the `failed` status.
    Failed,
    /// The budget ran out before a terminal status was seen.
    TimedOut { attempts: u32 },
}

/// Poll `handle` until a terminal status or `schedule.max_attempts` queries.
///
/// Never issues more than `max_attempts` status queries and never sleeps
/// after a terminal status or after the final query.
pub async fn poll(
    service: &dyn ReadService,
    handle: &OperationHandle,
    schedule: &PollSchedule,
    progress: Option<&ProgressCallback>,
) -> Result<PollOutcome, OcrError> {
    debug!("Polling operation {} (max {} attempts)", handle, schedule.max_attempts);

    for attempt in 1..=schedule.max_attempts {
        let result = match service.fetch_result(handle).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Operation {}: status query {} failed — {}", handle, attempt, e);
                return Err(e);
            }
        };

        if let Some(cb) = progress {
            cb.on_poll(attempt, schedule.max_attempts, &result.status.to_string());
        }

        if !result.status.is_terminal() {
            debug!("Operation {}: attempt {} status {}", handle, attempt, result.status);
            if attempt < schedule.max_attempts {
                sleep(schedule.delay_after(attempt)).await;
            }
            continue;
        }

        if result.status == OperationStatus::Succeeded {
            info!("Operation {} succeeded after {} status checks", handle, attempt);
            return Ok(PollOutcome::Succeeded(result));
        }
        warn!("Operation {} failed", handle);
        return Ok(PollOutcome::Failed);
    }

    warn!(
        "Operation {} timed out after {} status checks",
        handle, schedule.max_attempts
    );
    Ok(PollOutcome::TimedOut {
        attempts: schedule.max_attempts,
    })
}
