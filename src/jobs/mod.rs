use crate::metrics;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::credit_reset_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Reset every ledger whose reset date has passed
    async fn credit_reset_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.jobs.credit_reset_interval_secs.max(1);
        let mut interval = interval(Duration::from_secs(period));

        loop {
            interval.tick().await;
            info!("Running credit reset sweep");

            match tasks::reset_expired_credits(&scheduler.context).await {
                Ok(count) => {
                    metrics::record_background_job("credit_reset", "success");
                    if count > 0 {
                        info!("Reset {} expired credit ledgers", count);
                    } else {
                        info!("Credit reset: no expired ledgers found");
                    }
                }
                Err(e) => {
                    metrics::record_background_job("credit_reset", "error");
                    error!("Failed to reset expired credits: {}", e);
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => metrics::record_background_job("health_check", "success"),
                Err(e) => {
                    metrics::record_background_job("health_check", "error");
                    error!("Health check failed: {}", e);
                }
            }
        }
    }
}
