//! Waiter - Poll a status callback until a target state is reached
//!
//! Asynchronous AWS operations (broker creation, project updates, ...) return
//! before the remote object settles. A [`StateChangeConf`] describes which
//! statuses are still in progress and which are final; [`StateChangeConf::wait`]
//! re-invokes the refresh callback until one of the targets is observed.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::provider::{ErrorKind, ProviderError, ProviderResult};

/// Result of a single refresh: `None` when the object was not found,
/// otherwise the object and its current status.
pub type Refresh<T> = ProviderResult<Option<(T, String)>>;

#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    /// Empty when waiting for the object to disappear
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Initial sleep before the first refresh
    pub delay: Duration,
    pub poll_interval: Duration,
    /// How many consecutive not-found results are tolerated
    pub not_found_checks: u32,
    /// How many consecutive target observations are required
    pub continuous_target_occurrence: u32,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout,
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(5),
            not_found_checks: 20,
            continuous_target_occurrence: 1,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count.max(1);
        self
    }

    /// Poll `refresh` until a target status is seen.
    ///
    /// Returns `Ok(None)` only when `target` is empty and the object is gone.
    pub async fn wait<T, F, Fut>(&self, mut refresh: F) -> ProviderResult<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Refresh<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut not_found = 0u32;
        let mut target_seen = 0u32;
        let mut last_status: Option<String> = None;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        loop {
            match refresh().await? {
                None => {
                    if self.target.is_empty() {
                        return Ok(None);
                    }
                    target_seen = 0;
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(ProviderError::not_found(format!(
                            "couldn't find resource ({} retries)",
                            self.not_found_checks
                        )));
                    }
                    log::debug!("waiter: resource not found yet ({}/{})", not_found, self.not_found_checks);
                }
                Some((object, status)) => {
                    not_found = 0;
                    if self.target.contains(&status) {
                        target_seen += 1;
                        if target_seen >= self.continuous_target_occurrence {
                            return Ok(Some(object));
                        }
                    } else if self.pending.contains(&status) {
                        target_seen = 0;
                    } else {
                        return Err(ProviderError::new(format!(
                            "unexpected state '{}', wanted target '{}'",
                            status,
                            self.target.join(", ")
                        ))
                        .with_kind(ErrorKind::UnexpectedState));
                    }
                    log::debug!("waiter: status {}", status);
                    last_status = Some(status);
                }
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(ProviderError::new(format!(
                    "timeout while waiting for state to become '{}' (last state: '{}', timeout: {:?})",
                    self.target.join(", "),
                    last_status.as_deref().unwrap_or(""),
                    self.timeout
                ))
                .with_kind(ErrorKind::Timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Re-run `f` while it fails with a not-found error, up to `timeout`.
///
/// Covers the window right after creation where reads can still miss the
/// new object.
pub async fn retry_when_not_found<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut f: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match f().await {
            Err(e) if e.is_not_found() && Instant::now() + interval <= deadline => {
                log::debug!("retrying after not found: {}", e);
                tokio::time::sleep(interval).await;
            }
            result => return result,
        }
    }
}
