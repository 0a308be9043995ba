pub mod http;

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::{AppError, Result};

/// Bounds every remote call of a run by one timeout and one cancellation token.
#[derive(Debug, Clone)]
pub struct CallGuard {
    limit: Duration,
    cancel: CancellationToken,
}

impl CallGuard {
    pub fn new(limit: Duration, cancel: CancellationToken) -> Self {
        Self { limit, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `fut`, failing with `Network` once the limit elapses and with
    /// `Cancelled` as soon as the token fires.
    pub async fn run<T, F>(&self, service: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled(format!("{} call not started", service)));
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(AppError::Cancelled(format!("{} call aborted", service)))
            }
            outcome = tokio::time::timeout(self.limit, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(AppError::network(
                    service,
                    format!("timed out after {} seconds", self.limit.as_secs_f32()),
                )),
            },
        }
    }
}
