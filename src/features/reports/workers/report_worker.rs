use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tokio::time::interval;

use crate::core::config::WorkerConfig;
use crate::core::error::{AppError, Result};
use crate::features::reports::models::{Report, ReportStatus, REPORT_COLUMNS};
use crate::features::reports::services::{render, AnalyticsService};
use crate::modules::storage::{object_key, BlobStore};

/// Where a report goes after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryDecision {
    pub status: ReportStatus,
    pub retry_count: i32,
    pub next_attempt_at: DateTime<Utc>,
}

/// Back to `pending` after a fixed backoff while attempts remain, otherwise
/// terminal `failed`
pub fn retry_decision(
    retry_count: i32,
    max_retries: i32,
    backoff: Duration,
    now: DateTime<Utc>,
) -> RetryDecision {
    let retry_count = retry_count + 1;
    if retry_count < max_retries {
        RetryDecision {
            status: ReportStatus::Pending,
            retry_count,
            next_attempt_at: now + backoff,
        }
    } else {
        RetryDecision {
            status: ReportStatus::Failed,
            retry_count,
            next_attempt_at: now,
        }
    }
}

/// Error recorded on a report reclaimed from `processing`
pub const ABANDONED_MESSAGE: &str = "Generation did not finish";

/// Rows in `processing` last touched before this instant are abandoned
pub fn stale_cutoff(now: DateTime<Utc>, timeout: std::time::Duration) -> DateTime<Utc> {
    Duration::from_std(timeout)
        .ok()
        .and_then(|timeout| now.checked_sub_signed(timeout))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Background worker that generates queued reports
pub struct ReportWorker {
    pool: PgPool,
    analytics: Arc<AnalyticsService>,
    store: Arc<dyn BlobStore>,
    prefix: String,
    config: WorkerConfig,
}

impl ReportWorker {
    pub fn new(
        pool: PgPool,
        analytics: Arc<AnalyticsService>,
        store: Arc<dyn BlobStore>,
        prefix: String,
        config: WorkerConfig,
    ) -> Self {
        Self {
            pool,
            analytics,
            store,
            prefix,
            config,
        }
    }

    /// Run the worker in a background loop
    pub async fn run(&self) {
        tracing::info!(
            "Starting report worker (poll every {:?}, batch {})",
            self.config.poll_interval,
            self.config.batch_size
        );

        let mut interval = interval(self.config.poll_interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.reclaim_stale().await {
                tracing::error!("Error reclaiming stale reports: {:?}", e);
            }
            if let Err(e) = self.process_batch().await {
                tracing::error!("Error processing report batch: {:?}", e);
            }
            if let Err(e) = self.purge_failed().await {
                tracing::error!("Error purging failed reports: {:?}", e);
            }
        }
    }

    /// Claim due reports and generate each one
    pub async fn process_batch(&self) -> Result<usize> {
        let reports = self.claim_batch().await?;
        if reports.is_empty() {
            return Ok(0);
        }

        tracing::info!("Generating {} reports", reports.len());
        let claimed = reports.len();

        for report in reports {
            if let Err(e) = self.generate(&report).await {
                tracing::error!("Failed to generate report {}: {}", report.id, e);
                if let Err(e) = self.mark_failed(&report, &e.to_string()).await {
                    // Left in `processing`; reclaim_stale picks it up later
                    tracing::error!("Could not record failure of report {}: {}", report.id, e);
                }
            }
        }

        Ok(claimed)
    }

    /// Flip due `pending` rows to `processing`. Rows locked by another worker
    /// are skipped.
    async fn claim_batch(&self) -> Result<Vec<Report>> {
        let mut tx = self.begin().await?;

        let query = format!(
            r#"
            UPDATE reports SET status = 'processing', updated_at = NOW()
            WHERE id IN (
                SELECT id FROM reports
                WHERE status = 'pending' AND next_attempt_at <= NOW()
                ORDER BY next_attempt_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {REPORT_COLUMNS}
            "#
        );
        let reports = sqlx::query_as::<_, Report>(&query)
            .bind(self.config.batch_size)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to claim pending reports: {:?}", e);
                AppError::Database(e)
            })?;

        self.commit(tx).await?;
        Ok(reports)
    }

    async fn generate(&self, report: &Report) -> Result<()> {
        let analytics = self.analytics.analytics(&report.parameters).await?;
        let bytes = render::render(report.report_type, report.format, &report.name, &analytics)?;
        let file_size = bytes.len() as i64;
        let file_key = object_key(&self.prefix, report.id, report.format.extension());

        self.store
            .put(&file_key, bytes, report.format.content_type())
            .await?;

        let updated = sqlx::query(
            r#"
            UPDATE reports
            SET status = 'generated', file_key = $2, file_size = $3, error_message = NULL,
                generated_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(report.id)
        .bind(&file_key)
        .bind(file_size)
        .execute(&self.pool)
        .await;

        match updated {
            Ok(result) if result.rows_affected() == 1 => {
                tracing::info!("Report {} generated ({} bytes)", report.id, file_size);
                Ok(())
            }
            outcome => {
                // Deleted while generating, or the update failed
                if let Err(e) = self.store.delete(&file_key).await {
                    tracing::warn!("Failed to remove unused report file {}: {}", file_key, e);
                }
                match outcome {
                    Err(e) => Err(AppError::Database(e)),
                    Ok(_) => {
                        tracing::info!("Report {} disappeared during generation", report.id);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Count a crashed or hung attempt against rows stuck in `processing`
    /// past the configured timeout, sending each back to `pending` or to
    /// `failed` like any other failed attempt
    pub async fn reclaim_stale(&self) -> Result<usize> {
        let mut tx = self.begin().await?;

        let query = format!(
            r#"
            SELECT {REPORT_COLUMNS} FROM reports
            WHERE status = 'processing' AND updated_at < $1
            ORDER BY updated_at
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#
        );
        let stale = sqlx::query_as::<_, Report>(&query)
            .bind(stale_cutoff(Utc::now(), self.config.processing_timeout))
            .bind(self.config.batch_size)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to find stale reports: {:?}", e);
                AppError::Database(e)
            })?;

        for report in &stale {
            tracing::warn!("Report {} stuck in processing, reclaiming", report.id);
            let decision = self.decide_retry(report);
            Self::record_attempt(&mut *tx, report, &decision, ABANDONED_MESSAGE).await?;
        }

        self.commit(tx).await?;
        Ok(stale.len())
    }

    fn decide_retry(&self, report: &Report) -> RetryDecision {
        let backoff =
            Duration::from_std(self.config.retry_backoff).unwrap_or_else(|_| Duration::zero());
        retry_decision(
            report.retry_count,
            self.config.max_retries,
            backoff,
            Utc::now(),
        )
    }

    async fn record_attempt<'e, E>(
        executor: E,
        report: &Report,
        decision: &RetryDecision,
        error_message: &str,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE reports
            SET status = $2, error_message = $3, retry_count = $4, next_attempt_at = $5,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(report.id)
        .bind(decision.status)
        .bind(error_message)
        .bind(decision.retry_count)
        .bind(decision.next_attempt_at)
        .execute(executor)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record report failure: {:?}", e);
            AppError::Database(e)
        })?;
        Ok(())
    }

    async fn mark_failed(&self, report: &Report, error_message: &str) -> Result<()> {
        let decision = self.decide_retry(report);
        Self::record_attempt(&self.pool, report, &decision, error_message).await?;

        if decision.status == ReportStatus::Failed {
            tracing::warn!(
                "Report {} permanently failed after {} attempts",
                report.id,
                decision.retry_count
            );
        } else {
            tracing::info!(
                "Report {} will retry at {} ({}/{})",
                report.id,
                decision.next_attempt_at,
                decision.retry_count,
                self.config.max_retries
            );
        }
        Ok(())
    }

    /// Remove reports that failed more than the retention period ago,
    /// including any file they still reference
    async fn purge_failed(&self) -> Result<()> {
        let purged: Vec<(uuid::Uuid, Option<String>)> = sqlx::query_as(
            r#"
            DELETE FROM reports
            WHERE status = 'failed' AND updated_at < NOW() - make_interval(days => $1)
            RETURNING id, file_key
            "#,
        )
        .bind(self.config.failed_retention_days as i32)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to purge failed reports: {:?}", e);
            AppError::Database(e)
        })?;

        for (id, file_key) in &purged {
            if let Some(key) = file_key {
                if let Err(e) = self.store.delete(key).await {
                    tracing::warn!("Failed to delete file of report {}: {}", id, e);
                }
            }
        }
        if !purged.is_empty() {
            tracing::info!("Purged {} failed reports", purged.len());
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to start transaction: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn commit(&self, tx: Transaction<'static, Postgres>) -> Result<()> {
        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit transaction: {:?}", e);
            AppError::Database(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::MemoryStore;
    use crate::shared::test_helpers::lazy_pool;

    #[test]
    fn test_retry_goes_back_to_pending_with_backoff() {
        let now = Utc::now();
        let decision = retry_decision(0, 3, Duration::seconds(60), now);
        assert_eq!(decision.status, ReportStatus::Pending);
        assert_eq!(decision.retry_count, 1);
        assert_eq!(decision.next_attempt_at, now + Duration::seconds(60));

        let decision = retry_decision(1, 3, Duration::seconds(60), now);
        assert_eq!(decision.status, ReportStatus::Pending);
        assert_eq!(decision.retry_count, 2);
    }

    #[test]
    fn test_retries_are_bounded() {
        let decision = retry_decision(2, 3, Duration::seconds(60), Utc::now());
        assert_eq!(decision.status, ReportStatus::Failed);
        assert_eq!(decision.retry_count, 3);
    }

    #[test]
    fn test_stale_cutoff_is_timeout_before_now() {
        let now = Utc::now();
        let cutoff = stale_cutoff(now, std::time::Duration::from_secs(600));
        assert_eq!(cutoff, now - Duration::minutes(10));

        // An absurd timeout never reclaims anything instead of overflowing
        let cutoff = stale_cutoff(now, std::time::Duration::from_secs(u64::MAX));
        assert_eq!(cutoff, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_abandoned_attempt_counts_against_retries() {
        let config = WorkerConfig::default();
        let now = Utc::now();
        let backoff = Duration::from_std(config.retry_backoff).unwrap();

        let early = retry_decision(0, config.max_retries, backoff, now);
        assert_eq!(early.status, ReportStatus::Pending);

        let last = retry_decision(config.max_retries - 1, config.max_retries, backoff, now);
        assert_eq!(last.status, ReportStatus::Failed);
        assert_eq!(last.retry_count, config.max_retries);
    }

    fn worker() -> ReportWorker {
        let pool = lazy_pool();
        ReportWorker::new(
            pool.clone(),
            Arc::new(AnalyticsService::new(pool)),
            Arc::new(MemoryStore::new()),
            "reports".into(),
            WorkerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_batch_errors_surface_without_panicking() {
        assert!(worker().process_batch().await.is_err());
    }

    #[tokio::test]
    async fn test_reclaim_errors_surface_without_panicking() {
        assert!(worker().reclaim_stale().await.is_err());
    }
}
