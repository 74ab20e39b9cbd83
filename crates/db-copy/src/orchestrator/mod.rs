//! Copy orchestrator - connects both endpoints and runs one copy job.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::{redact_descriptor, CopyJob};
use crate::core::catalog::DriverCatalog;
use crate::core::traits::{SourceReader, TargetWriter, TypeMapper};
use crate::error::Result;
use crate::transfer::{CopyEngine, CopyPhase, ProgressUpdate};

/// Copy orchestrator.
pub struct Orchestrator {
    job: CopyJob,
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    mapper: Arc<dyn TypeMapper>,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
}

/// Result of a copy job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyResult {
    /// Table that was copied.
    pub table: String,

    /// Source dialect name.
    pub source_dialect: String,

    /// Destination dialect name.
    pub dest_dialect: String,

    /// Rows written to the destination.
    pub rows_copied: u64,

    /// Insert batches issued.
    pub batches: u64,

    /// Whether the destination table was created by this job.
    pub table_created: bool,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the copy started.
    pub started_at: DateTime<Utc>,

    /// When the copy completed.
    pub completed_at: DateTime<Utc>,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,
}

impl Orchestrator {
    /// Connect both endpoints of a job.
    ///
    /// The source is opened first; a failure names the endpoint that could
    /// not be reached.
    pub async fn new(job: CopyJob) -> Result<Self> {
        Self::with_catalog(job, &DriverCatalog::with_builtins()).await
    }

    /// Connect both endpoints using the readers, writers and mappers of `catalog`.
    pub async fn with_catalog(job: CopyJob, catalog: &DriverCatalog) -> Result<Self> {
        debug!("{}: {}", job.table, CopyPhase::NotConnected);
        let mapper = catalog.require_mapper(job.source_dialect(), job.dest_dialect())?;

        info!(
            "Connecting {} source {}",
            job.source_dialect(),
            redact_descriptor(&job.source)
        );
        let source = catalog.create_reader(&job.source).await?;

        info!(
            "Connecting {} destination {}",
            job.dest_dialect(),
            redact_descriptor(&job.dest)
        );
        let target = match catalog.create_writer(&job.dest).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };
        debug!("{}: {}", job.table, CopyPhase::Connected);

        Ok(Self {
            job,
            source,
            target,
            mapper,
            progress_tx: None,
        })
    }

    /// Set a progress channel for per-batch updates.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Run the copy and close both endpoints.
    pub async fn run(self) -> Result<CopyResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Starting copy of {} ({} -> {}, batch size {})",
            self.job.table,
            self.job.source_dialect(),
            self.job.dest_dialect(),
            self.job.batch_size
        );

        let mut engine = CopyEngine::new(
            self.source.clone(),
            self.target.clone(),
            self.mapper.clone(),
        );
        if let Some(tx) = self.progress_tx.clone() {
            engine = engine.with_progress(tx);
        }

        let outcome = engine.copy(&self.job.table, self.job.batch_size).await;
        self.close().await;

        let stats = match outcome {
            Ok(stats) => stats,
            Err(e) => {
                error!("Copy of {} failed: {}", self.job.table, e);
                return Err(e);
            }
        };

        let duration = start.elapsed();
        let duration_seconds = duration.as_secs_f64();
        let rows_per_second = if duration_seconds > 0.0 {
            (stats.rows_copied as f64 / duration_seconds) as u64
        } else {
            stats.rows_copied
        };

        info!(
            "Copy of {} complete: {} rows in {:.2}s ({} rows/sec)",
            self.job.table, stats.rows_copied, duration_seconds, rows_per_second
        );

        Ok(CopyResult {
            table: self.job.table.clone(),
            source_dialect: self.job.source_dialect().name().to_string(),
            dest_dialect: self.job.dest_dialect().name().to_string(),
            rows_copied: stats.rows_copied,
            batches: stats.batches,
            table_created: stats.table_created,
            duration_seconds,
            started_at,
            completed_at: Utc::now(),
            rows_per_second,
        })
    }

    /// Close both connection pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

impl CopyResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopyError;

    #[test]
    fn test_copy_result_to_json() {
        let now = Utc::now();
        let result = CopyResult {
            table: "sample_users".into(),
            source_dialect: "sqlite".into(),
            dest_dialect: "postgres".into(),
            rows_copied: 2500,
            batches: 3,
            table_created: true,
            duration_seconds: 1.5,
            started_at: now,
            completed_at: now,
            rows_per_second: 1666,
        };

        let json = result.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["rows_copied"], 2500);
        assert_eq!(parsed["dest_dialect"], "postgres");
        assert_eq!(parsed["table_created"], true);
    }

    #[tokio::test]
    async fn test_missing_source_file_is_source_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("missing.db");
        let dest = dir.path().join("dest.db");
        let job = CopyJob::new(
            source.to_string_lossy(),
            dest.to_string_lossy(),
            "users",
            100,
        )
        .unwrap();

        let err = Orchestrator::new(job).await.err().unwrap();
        match err {
            CopyError::Connection { endpoint, .. } => assert_eq!(endpoint, "source"),
            other => panic!("expected connection error, got {:?}", other),
        }
        assert!(!dest.exists());
    }
}
