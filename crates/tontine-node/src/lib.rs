//! Tontine Node - drives the time-based transitions of a tontine store.
//!
//! The core never owns a timer. This daemon calls [`Tontine::tick`] on a
//! fixed interval so invitations expire, payments turn late and scheduled
//! cycles activate without anyone touching the group.

use chrono::Utc;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tontine_core::{Notifier, Store, TickReport, Tontine, TontineConfig};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Core(#[from] tontine_core::Error),

    #[error("tick task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Configuration for a tontine node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for persistent storage
    pub data_dir: PathBuf,

    /// Time between two ticks
    pub tick_interval: Duration,

    pub tontine: TontineConfig,
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let data_dir = PathBuf::from(
            std::env::var("TONTINE_DATA_DIR").unwrap_or_else(|_| "./tontine-data".to_string()),
        );

        let tick_secs: u64 = match std::env::var("TONTINE_TICK_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| NodeError::Config(format!("invalid TONTINE_TICK_SECS: {raw:?}")))?,
            Err(_) => 60,
        };
        if tick_secs == 0 {
            return Err(NodeError::Config("TONTINE_TICK_SECS must be positive".into()));
        }

        Ok(Self {
            data_dir,
            tick_interval: Duration::from_secs(tick_secs),
            tontine: TontineConfig::from_env()?,
        })
    }
}

/// Runs [`Tontine::tick`] on an interval.
pub struct TickNode<S, N> {
    tontine: Arc<Tontine<S, N>>,
    interval: Duration,
}

impl<S, N> TickNode<S, N>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    pub fn new(tontine: Tontine<S, N>, interval: Duration) -> Self {
        Self {
            tontine: Arc::new(tontine),
            interval,
        }
    }

    pub fn tontine(&self) -> &Arc<Tontine<S, N>> {
        &self.tontine
    }

    /// One tick at the current time. Store access blocks, so it runs on
    /// the blocking pool.
    pub async fn tick_once(&self) -> Result<TickReport> {
        let tontine = Arc::clone(&self.tontine);
        let report = tokio::task::spawn_blocking(move || tontine.tick(Utc::now())).await??;
        Ok(report)
    }

    /// Tick until `shutdown` resolves. A failed tick is logged and the next
    /// one runs on schedule.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Tick loop starting, every {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Tick loop stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.tick_once().await {
                        Ok(report) if !report.is_empty() => tracing::debug!(?report, "tick applied"),
                        Ok(_) => {}
                        Err(e) => tracing::error!("Tick failed: {}", e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tontine_core::{
        InvitationStatus, InviteTarget, MemoryStore, NewGroup, NullNotifier, UserId,
    };

    #[tokio::test]
    async fn tick_expires_old_invitations() {
        let config = TontineConfig::default().with_invitation_ttl(chrono::Duration::hours(1));
        let tontine = Tontine::with_notifier(MemoryStore::new(), NullNotifier, config);
        let ada = UserId::new("ada");
        let created = Utc::now() - chrono::Duration::hours(2);
        let g = tontine
            .create_group(NewGroup::new("Node", Decimal::from(5), 3), ada.clone(), created)
            .unwrap();
        tontine
            .create_invitation(&g.id, InviteTarget::email("bo@example.com"), &ada, created)
            .unwrap();

        let node = TickNode::new(tontine, Duration::from_secs(1));
        let report = node.tick_once().await.unwrap();
        assert_eq!(report.expired_invitations, 1);

        let invitations = node.tontine().invitations(&g.id).unwrap();
        assert_eq!(invitations[0].status, InvitationStatus::Expired);
    }

    #[tokio::test]
    async fn run_until_returns_on_shutdown() {
        let tontine = Tontine::with_notifier(MemoryStore::new(), NullNotifier, TontineConfig::default());
        let node = TickNode::new(tontine, Duration::from_millis(10));
        node.run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();
    }
}
