//! Instance refresh convergence.
//!
//! After the cluster root changes a launch template, the Auto Scaling groups
//! replace their instances through an instance refresh. The poller tracks a
//! refresh that is already running (or starts one), then checks its status at
//! a fixed interval until AWS reports a terminal state.
//!
//! Hitting the timeout is not an error: the poller logs a warning and returns
//! `RefreshOutcome::TimedOut` so a slow refresh does not fail the run.
//! Failures of individual status checks are logged and retried on the next
//! tick.

use crate::aws::AwsError;
use common::config::TestConfig;
use common::types::{InstanceRefresh, RefreshStatus};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// Auto Scaling operations the poller needs (enables mocking).
#[async_trait::async_trait]
pub trait InstanceRefreshApi: Send + Sync {
    /// All known refreshes of a group, most recent first.
    async fn describe_instance_refreshes(
        &self,
        asg_name: &str,
    ) -> Result<Vec<InstanceRefresh>, AwsError>;

    /// Start a refresh and return its id.
    async fn start_instance_refresh(&self, asg_name: &str) -> Result<String, AwsError>;
}

/// Poll interval and wall-clock budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(3600),
        }
    }
}

impl From<&TestConfig> for RefreshPolicy {
    fn from(config: &TestConfig) -> Self {
        Self {
            poll_interval: config.refresh_poll_interval,
            timeout: config.refresh_timeout,
        }
    }
}

/// How waiting for a refresh ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// AWS reported a terminal status.
    Completed {
        refresh_id: String,
        status: RefreshStatus,
    },

    /// The timeout elapsed first. `last_status` is the last status seen, if any check succeeded.
    TimedOut {
        refresh_id: String,
        last_status: Option<RefreshStatus>,
    },
}

impl RefreshOutcome {
    pub fn refresh_id(&self) -> &str {
        match self {
            RefreshOutcome::Completed { refresh_id, .. }
            | RefreshOutcome::TimedOut { refresh_id, .. } => refresh_id,
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Completed {
                status: RefreshStatus::Successful,
                ..
            }
        )
    }
}

/// Find the running refresh of a group, or start a new one.
///
/// Returns the refresh id and whether this call started it.
pub async fn track_or_start_refresh<A>(api: &A, asg_name: &str) -> Result<(String, bool), AwsError>
where
    A: InstanceRefreshApi + ?Sized,
{
    let refreshes = api.describe_instance_refreshes(asg_name).await?;

    if let Some(running) = refreshes.iter().find(|r| r.is_in_progress()) {
        info!(
            target: "cluster_tests::refresh",
            asg = %asg_name,
            refresh_id = %running.instance_refresh_id,
            status = %running.status,
            "Tracking in-progress instance refresh"
        );
        return Ok((running.instance_refresh_id.clone(), false));
    }

    let refresh_id = api.start_instance_refresh(asg_name).await?;
    info!(
        target: "cluster_tests::refresh",
        asg = %asg_name,
        refresh_id = %refresh_id,
        "Started instance refresh"
    );
    Ok((refresh_id, true))
}

/// Wait for the group's instance refresh to reach a terminal status.
pub async fn wait_for_instance_refresh<A>(
    api: &A,
    asg_name: &str,
    policy: RefreshPolicy,
) -> Result<RefreshOutcome, AwsError>
where
    A: InstanceRefreshApi + ?Sized,
{
    let (refresh_id, _) = track_or_start_refresh(api, asg_name).await?;
    let start = Instant::now();
    let mut last_status = None;

    loop {
        match api.describe_instance_refreshes(asg_name).await {
            Ok(refreshes) => {
                match refreshes
                    .into_iter()
                    .find(|r| r.instance_refresh_id == refresh_id)
                {
                    Some(refresh) if refresh.status.is_terminal() => {
                        info!(
                            target: "cluster_tests::refresh",
                            asg = %asg_name,
                            refresh_id = %refresh_id,
                            status = %refresh.status,
                            elapsed_secs = start.elapsed().as_secs(),
                            "Instance refresh finished"
                        );
                        return Ok(RefreshOutcome::Completed {
                            refresh_id,
                            status: refresh.status,
                        });
                    }
                    Some(refresh) => {
                        info!(
                            target: "cluster_tests::refresh",
                            asg = %asg_name,
                            refresh_id = %refresh_id,
                            status = %refresh.status,
                            percentage_complete = ?refresh.percentage_complete,
                            "Instance refresh still running"
                        );
                        last_status = Some(refresh.status);
                    }
                    None => {
                        warn!(
                            target: "cluster_tests::refresh",
                            asg = %asg_name,
                            refresh_id = %refresh_id,
                            "Instance refresh not listed yet"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(
                    target: "cluster_tests::refresh",
                    asg = %asg_name,
                    refresh_id = %refresh_id,
                    error = %e,
                    "Instance refresh status check failed, retrying"
                );
            }
        }

        if start.elapsed() + policy.poll_interval > policy.timeout {
            warn!(
                target: "cluster_tests::refresh",
                asg = %asg_name,
                refresh_id = %refresh_id,
                timeout_secs = policy.timeout.as_secs(),
                last_status = ?last_status,
                "Instance refresh did not finish in time, continuing"
            );
            return Ok(RefreshOutcome::TimedOut {
                refresh_id,
                last_status,
            });
        }

        sleep(policy.poll_interval).await;
    }
}

/// Mock Auto Scaling API module for testing.
///
/// This module provides a scripted implementation of [`InstanceRefreshApi`].
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted instance refresh API.
    ///
    /// Each `describe_instance_refreshes` call pops the next scripted
    /// response; once the script is exhausted the last response repeats.
    pub struct MockRefreshApi {
        responses: Mutex<VecDeque<Result<Vec<InstanceRefresh>, String>>>,
        last: Mutex<Option<Vec<InstanceRefresh>>>,
        started_id: String,
        describe_calls: AtomicUsize,
        start_calls: AtomicUsize,
    }

    impl MockRefreshApi {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                last: Mutex::new(None),
                started_id: "refresh-started".to_string(),
                describe_calls: AtomicUsize::new(0),
                start_calls: AtomicUsize::new(0),
            }
        }

        /// Queue a successful describe response.
        pub fn then_describe(self, refreshes: Vec<InstanceRefresh>) -> Self {
            self.push(Ok(refreshes))
        }

        /// Queue a failed describe response.
        pub fn then_fail(self, message: &str) -> Self {
            self.push(Err(message.to_string()))
        }

        /// Id returned by `start_instance_refresh`.
        pub fn starting(mut self, refresh_id: &str) -> Self {
            self.started_id = refresh_id.to_string();
            self
        }

        fn push(self, response: Result<Vec<InstanceRefresh>, String>) -> Self {
            if let Ok(mut responses) = self.responses.lock() {
                responses.push_back(response);
            }
            self
        }

        pub fn describe_calls(&self) -> usize {
            self.describe_calls.load(Ordering::SeqCst)
        }

        pub fn start_calls(&self) -> usize {
            self.start_calls.load(Ordering::SeqCst)
        }
    }

    impl Default for MockRefreshApi {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Build a refresh entry for scripting.
    pub fn refresh(id: &str, status: RefreshStatus) -> InstanceRefresh {
        InstanceRefresh {
            instance_refresh_id: id.to_string(),
            auto_scaling_group_name: "mock-asg".to_string(),
            status,
            status_reason: None,
            percentage_complete: None,
        }
    }

    #[async_trait::async_trait]
    impl InstanceRefreshApi for MockRefreshApi {
        async fn describe_instance_refreshes(
            &self,
            _asg_name: &str,
        ) -> Result<Vec<InstanceRefresh>, AwsError> {
            self.describe_calls.fetch_add(1, Ordering::SeqCst);

            let next = self
                .responses
                .lock()
                .map_err(|_| AwsError::Unexpected("mock lock poisoned".to_string()))?
                .pop_front();

            let mut last = self
                .last
                .lock()
                .map_err(|_| AwsError::Unexpected("mock lock poisoned".to_string()))?;

            match next {
                Some(Ok(refreshes)) => {
                    *last = Some(refreshes.clone());
                    Ok(refreshes)
                }
                Some(Err(message)) => Err(AwsError::Unexpected(message)),
                None => Ok(last.clone().unwrap_or_default()),
            }
        }

        async fn start_instance_refresh(&self, _asg_name: &str) -> Result<String, AwsError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.started_id.clone())
        }
    }
}
