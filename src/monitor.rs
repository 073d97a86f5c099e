//! Check orchestration: reconcile the store, fan out probes under a shared
//! concurrency limit, detect up/down transitions, commit once.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::{Config, IpTarget, RuntimeParams, UrlTarget};
use crate::db::models::TargetKind;
use crate::db::status_service;
use crate::probe::Prober;

/// Address pinged before a run to confirm general internet connectivity.
const PRECHECK_ADDRESS: &str = "1.1.1.1";

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One detected state change, applied to the store at commit time.
#[derive(Debug, Clone)]
struct Transition {
    kind: TargetKind,
    address: String,
    description: String,
    is_down: bool,
}

/// Aggregated outcome of one orchestration pass.
///
/// Descriptions appear in task completion order, at most once per target.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub down: Vec<String>,
    pub up: Vec<String>,
}

/// Drives one batch run over a validated configuration snapshot.
pub struct Monitor {
    pool: SqlitePool,
    prober: Arc<dyn Prober>,
    params: RuntimeParams,
}

impl Monitor {
    pub fn new(pool: SqlitePool, prober: Arc<dyn Prober>, params: RuntimeParams) -> Self {
        Self {
            pool,
            prober,
            params,
        }
    }

    /// Runs every configured check once and returns the transitions.
    ///
    /// Reconciliation completes before the first probe starts. Check tasks
    /// only read the store; all writes happen in a single transaction after
    /// the last task finishes, so an aborted run commits nothing.
    pub async fn run(&self, config: &Config) -> Result<RunOutcome, MonitorError> {
        let current_ips: HashSet<String> = config.ips.iter().map(|t| t.ip.clone()).collect();
        let current_urls: HashSet<String> = config.urls.iter().map(|t| t.url.clone()).collect();
        status_service::remove_stale(&self.pool, &current_ips, &current_urls).await?;

        let semaphore = Arc::new(Semaphore::new(self.params.concurrency));
        let mut tasks: JoinSet<Result<Option<Transition>, sqlx::Error>> = JoinSet::new();

        for target in config.ips.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let prober = Arc::clone(&self.prober);
            let pool = self.pool.clone();
            let ping_timeout = self.params.ping_timeout;
            let quiet = self.params.quiet;
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                if !quiet {
                    println!("IP {} ({}): check started", target.ip, target.description);
                }
                check_ip(&pool, prober.as_ref(), &target, ping_timeout).await
            });
        }

        for target in config.urls.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let prober = Arc::clone(&self.prober);
            let pool = self.pool.clone();
            let quiet = self.params.quiet;
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                if !quiet {
                    println!("URL {} ({}): check started", target.url, target.description);
                }
                check_url_status(&pool, prober.as_ref(), &target).await
            });
        }

        let mut outcome = RunOutcome::default();
        let mut transitions: Vec<Transition> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Some(transition))) => {
                    if transition.is_down {
                        outcome.down.push(transition.description.clone());
                    } else {
                        outcome.up.push(transition.description.clone());
                    }
                    transitions.push(transition);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    // one bad target must not poison the batch
                    error!(error = %e, "check task failed");
                }
                Err(e) => {
                    error!(error = %e, "check task panicked or was aborted");
                }
            }
        }

        let mut tx = self.pool.begin().await?;
        for transition in &transitions {
            status_service::update_status(
                &mut *tx,
                transition.kind,
                &transition.address,
                transition.is_down,
            )
            .await?;
        }
        tx.commit().await?;

        Ok(outcome)
    }
}

/// Pings a well-known address to confirm the run has any connectivity.
///
/// A gated run performs no checks, no store writes and no notifications.
pub async fn precheck_internet(prober: &dyn Prober, timeout: Duration, quiet: bool) -> bool {
    info!("prechecking internet connectivity (ping {PRECHECK_ADDRESS})");
    if !quiet {
        print!("Checking internet connectivity... ");
        let _ = std::io::stdout().flush();
    }
    if prober.ping(PRECHECK_ADDRESS, timeout).await {
        if !quiet {
            println!("OK");
        }
        true
    } else {
        println!("No internet connection.");
        false
    }
}

async fn check_ip(
    pool: &SqlitePool,
    prober: &dyn Prober,
    target: &IpTarget,
    ping_timeout: Duration,
) -> Result<Option<Transition>, sqlx::Error> {
    info!(ip = %target.ip, "checking ip");
    let reachable = prober.ping(&target.ip, ping_timeout).await;
    transition_for(pool, TargetKind::Ip, &target.ip, &target.description, reachable).await
}

async fn check_url_status(
    pool: &SqlitePool,
    prober: &dyn Prober,
    target: &UrlTarget,
) -> Result<Option<Transition>, sqlx::Error> {
    info!(url = %target.url, "checking url");
    let reachable = prober.check_url(&target.url).await;
    transition_for(pool, TargetKind::Url, &target.url, &target.description, reachable).await
}

/// Two-state edge detection against the stored state.
///
/// Only a change yields a transition (and later a store write); a target
/// that stays down or stays up is a no-op, which is what suppresses
/// duplicate notifications across runs.
async fn transition_for(
    pool: &SqlitePool,
    kind: TargetKind,
    address: &str,
    description: &str,
    reachable: bool,
) -> Result<Option<Transition>, sqlx::Error> {
    let was_down = status_service::is_down(pool, kind, address).await?;
    let transition = match (reachable, was_down) {
        (false, false) => {
            info!(kind = %kind, address, "target newly down");
            Some(Transition {
                kind,
                address: address.to_string(),
                description: description.to_string(),
                is_down: true,
            })
        }
        (true, true) => {
            info!(kind = %kind, address, "target back up");
            Some(Transition {
                kind,
                address: address.to_string(),
                description: description.to_string(),
                is_down: false,
            })
        }
        _ => None,
    };
    Ok(transition)
}
