//! Startup orchestration: load, retry, promote, ready.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::errors::{Error, Result};
use crate::ledger::due::promote_due_entries;
use crate::ledger::retry::retry_failed_entries;
use crate::ledger::LedgerContext;
use crate::remote::RemoteLedgerClient;

/// Phase of the startup sequence. Transitions are strictly sequential and
/// run exactly once per process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchPhase {
    Idle,
    Loading,
    Retrying,
    Promoting,
    Ready,
}

/// Drives the fixed startup sequence and exposes its phase.
pub struct LaunchCoordinator {
    phase: watch::Sender<LaunchPhase>,
}

impl Default for LaunchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LaunchCoordinator {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(LaunchPhase::Idle);
        Self { phase }
    }

    /// Current phase.
    pub fn phase(&self) -> LaunchPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<LaunchPhase> {
        self.phase.subscribe()
    }

    /// Run the startup sequence: load all collections, retry the failure
    /// queue, promote due scheduled entries, then enter `Ready`.
    ///
    /// Returns [`Error::StartupAlreadyRan`] on any call after the first;
    /// there is no re-entry into `Loading` within one process lifetime.
    pub async fn run_startup_sequence(
        &self,
        context: &LedgerContext,
        client: &dyn RemoteLedgerClient,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut entered = false;
        self.phase.send_if_modified(|phase| {
            if *phase == LaunchPhase::Idle {
                *phase = LaunchPhase::Loading;
                entered = true;
                return true;
            }
            false
        });
        if !entered {
            return Err(Error::StartupAlreadyRan);
        }

        info!("Startup: loading collections");
        context.load_all().await;

        self.advance(LaunchPhase::Retrying);
        retry_failed_entries(context, client).await;

        self.advance(LaunchPhase::Promoting);
        promote_due_entries(context, client, now).await;

        self.advance(LaunchPhase::Ready);
        info!("Startup: ready");
        Ok(())
    }

    fn advance(&self, phase: LaunchPhase) {
        self.phase.send_replace(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_starts_idle() {
        assert_eq!(LaunchCoordinator::new().phase(), LaunchPhase::Idle);
    }
}
