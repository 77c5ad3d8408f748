//! Explicit reconnection policy for the push channel.
//!
//! Nothing reconnects implicitly. A [`ReconnectSupervisor`] has to be
//! spawned, and it follows a [`ReconnectPolicy`] whose progress is
//! observable through [`SupervisorStatus`].

use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::connection::{ConnectionState, HubConnection};

/// Exponential backoff with a cap and a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts per outage; 0 disables reconnection.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Attempt counter for one outage.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Delay before the next attempt, or `None` once attempts are spent.
    ///
    /// The n-th delay is `initial_delay * 2^n`, capped at `max_delay`.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        let factor = 1u32 << self.attempts.min(16);
        let delay = self
            .policy
            .initial_delay
            .saturating_mul(factor)
            .min(self.policy.max_delay);
        self.attempts += 1;
        Some(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStatus {
    /// Connected, or nothing to do.
    Idle,
    /// Sleeping before attempt `attempt`.
    Waiting { attempt: u32, delay: Duration },
    /// Attempt `attempt` in progress.
    Reconnecting { attempt: u32 },
    /// Attempts exhausted; the connection stays down until started by hand.
    GaveUp,
}

/// Background task that restarts a connection after unexpected closes.
pub struct ReconnectSupervisor {
    status: watch::Receiver<SupervisorStatus>,
    task: JoinHandle<()>,
}

impl ReconnectSupervisor {
    pub fn spawn(connection: HubConnection, policy: ReconnectPolicy) -> Self {
        let (status_tx, status) = watch::channel(SupervisorStatus::Idle);
        let closed = connection.closed_events();
        let task = tokio::spawn(supervise(connection, policy, closed, status_tx));
        Self { status, task }
    }

    pub fn status(&self) -> SupervisorStatus {
        *self.status.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.clone()
    }
}

impl Drop for ReconnectSupervisor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn supervise(
    connection: HubConnection,
    policy: ReconnectPolicy,
    mut closed: broadcast::Receiver<super::ClosedEvent>,
    status: watch::Sender<SupervisorStatus>,
) {
    loop {
        match closed.recv().await {
            Ok(event) => {
                tracing::info!(error = ?event.error, "Hub connection closed, reconnecting");
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }

        let mut state = ReconnectState::new(policy);
        loop {
            if !connection.wants_connection() || connection.state() == ConnectionState::Connected {
                let _ = status.send(SupervisorStatus::Idle);
                break;
            }

            let Some(delay) = state.next_delay() else {
                tracing::warn!(attempts = state.attempts(), "Giving up on hub reconnection");
                let _ = status.send(SupervisorStatus::GaveUp);
                break;
            };

            let attempt = state.attempts();
            let _ = status.send(SupervisorStatus::Waiting { attempt, delay });
            tokio::time::sleep(delay).await;

            if !connection.wants_connection() {
                let _ = status.send(SupervisorStatus::Idle);
                break;
            }

            let _ = status.send(SupervisorStatus::Reconnecting { attempt });
            match connection.start().await {
                Ok(()) => {
                    tracing::info!(attempt, "Hub reconnected");
                    let _ = status.send(SupervisorStatus::Idle);
                    break;
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Hub reconnection attempt failed");
                }
            }
        }

        // Closures that happened while we were reconnecting are stale.
        closed = closed.resubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut state = ReconnectState::new(ReconnectPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        });
        let delays: Vec<_> = std::iter::from_fn(|| state.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
        assert_eq!(state.attempts(), 5);
        assert_eq!(state.next_delay(), None);

        state.reset();
        assert_eq!(state.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn disabled_policy_never_yields() {
        let mut state = ReconnectState::new(ReconnectPolicy::disabled());
        assert!(!ReconnectPolicy::disabled().is_enabled());
        assert_eq!(state.next_delay(), None);
    }
}
