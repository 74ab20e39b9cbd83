//! Batch copy engine.
//!
//! Copies one table from a [`SourceReader`] into a [`TargetWriter`]:
//!
//! - The source table is introspected first and its types translated
//! - The destination table is created only when it does not exist yet
//! - Rows stream from the source in `batch_size` chunks and every chunk is
//!   inserted into one destination transaction
//! - Any failure rolls the whole transaction back; nothing is committed
//!   until every chunk has been written

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::schema::Table;
use crate::core::traits::{SourceReader, TargetWriter, TypeMapper, WriteTransaction};
use crate::core::value::Batch;
use crate::error::{CopyError, Result};
use crate::schema::{introspect, SourceSchema};

/// Stage of a copy job, in the order a successful job passes through them.
///
/// A failure at any point after `Copying` starts ends in `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyPhase {
    NotConnected,
    Connected,
    SchemaEnsured,
    Copying,
    Committed,
    RolledBack,
}

impl fmt::Display for CopyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CopyPhase::NotConnected => "not connected",
            CopyPhase::Connected => "connected",
            CopyPhase::SchemaEnsured => "schema ensured",
            CopyPhase::Copying => "copying",
            CopyPhase::Committed => "committed",
            CopyPhase::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// Progress update sent after each inserted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// Table being copied.
    pub table: String,

    /// Rows inserted so far in this job.
    pub records_copied: u64,

    /// Rows counted in the source before the read started.
    pub total_records: u64,

    /// 1-based index of the batch just inserted.
    pub batch: u64,
}

/// Statistics from a finished copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Rows written to the destination.
    pub rows_copied: u64,

    /// Number of insert batches issued.
    pub batches: u64,

    /// Whether the destination table was created by this job.
    pub table_created: bool,

    /// Source row count taken before the read.
    pub total_records: u64,

    /// Time spent writing batches.
    pub write_time: Duration,
}

/// Copies a single table between two connected endpoints.
pub struct CopyEngine {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    mapper: Arc<dyn TypeMapper>,
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
}

impl CopyEngine {
    /// Create an engine over connected endpoints.
    ///
    /// `mapper` must translate from the source's dialect to the target's.
    pub fn new(
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
        mapper: Arc<dyn TypeMapper>,
    ) -> Self {
        Self {
            source,
            target,
            mapper,
            progress_tx: None,
        }
    }

    /// Set a progress channel for per-batch updates.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    async fn send_progress(&self, update: ProgressUpdate) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(update).await;
        }
    }

    /// Make sure the destination table exists, creating it from `table` when absent.
    ///
    /// An existing table is used as is; its columns are not compared with
    /// the source. Returns whether the table was created.
    pub async fn ensure_table(&self, table: &Table) -> Result<bool> {
        if self.target.table_exists(&table.name).await? {
            info!(
                "Table {} already exists in {} destination, skipping creation",
                table.name,
                self.target.dialect()
            );
            return Ok(false);
        }

        self.target.create_table(table).await?;
        info!("Created table {} in {} destination", table.name, self.target.dialect());
        Ok(true)
    }

    /// Copy `table` from the source to the destination in batches of `batch_size` rows.
    pub async fn copy(&self, table: &str, batch_size: usize) -> Result<CopyStats> {
        if batch_size == 0 {
            return Err(CopyError::Config("batch_size must be at least 1".into()));
        }

        debug!("{}: {}", table, CopyPhase::Connected);

        let schema = introspect(self.source.as_ref(), table, self.mapper.as_ref()).await?;
        let table_created = self.ensure_table(&schema.translated).await?;
        debug!("{}: {}", table, CopyPhase::SchemaEnsured);

        let total_records = self.source.row_count(table).await?;
        info!(
            "Copying {} rows of {} in batches of {}",
            total_records, table, batch_size
        );

        let mut tx = self.target.begin().await?;
        debug!("{}: {}", table, CopyPhase::Copying);

        let mut stats = CopyStats {
            table_created,
            total_records,
            ..Default::default()
        };

        let outcome = self
            .copy_batches(&schema, batch_size, tx.as_mut(), &mut stats)
            .await;
        if let Err(e) = outcome {
            warn!("Copy of {} failed, rolling back: {}", table, e);
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback of {} failed: {}", table, rollback_err);
            }
            debug!("{}: {}", table, CopyPhase::RolledBack);
            return Err(e);
        }

        tx.commit().await.map_err(|e| match e {
            CopyError::Commit { .. } => e,
            other => CopyError::commit(table, other),
        })?;
        debug!("{}: {}", table, CopyPhase::Committed);

        info!(
            "Committed {} rows into {} ({} batches)",
            stats.rows_copied, table, stats.batches
        );

        Ok(stats)
    }

    async fn copy_batches(
        &self,
        schema: &SourceSchema,
        batch_size: usize,
        tx: &mut dyn WriteTransaction,
        stats: &mut CopyStats,
    ) -> Result<()> {
        // The reader decodes by source types; only the writer sees the translation.
        let target = &schema.translated;
        let columns = target.column_names();
        let mut rx = self.source.read_table(&schema.native, batch_size);

        while let Some(batch) = rx.recv().await {
            let batch = batch?;
            let written = self.insert_one(target, &columns, &batch, tx, stats).await?;

            stats.rows_copied += written;
            stats.batches += 1;

            let (first, last) = batch.record_range();
            info!(
                "Inserted records {}-{} into {} ({}/{})",
                first, last, target.name, stats.rows_copied, stats.total_records
            );

            self.send_progress(ProgressUpdate {
                table: target.name.clone(),
                records_copied: stats.rows_copied,
                total_records: stats.total_records,
                batch: stats.batches,
            })
            .await;
        }

        Ok(())
    }

    async fn insert_one(
        &self,
        schema: &Table,
        columns: &[String],
        batch: &Batch,
        tx: &mut dyn WriteTransaction,
        stats: &mut CopyStats,
    ) -> Result<u64> {
        let started = Instant::now();
        let result = tx.insert_batch(&schema.name, columns, batch).await;
        stats.write_time += started.elapsed();

        result.map_err(|e| match e {
            CopyError::Insert { .. } => e,
            other => {
                let (first, last) = batch.record_range();
                CopyError::insert(&schema.name, first, last, other)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Column;
    use crate::core::value::{Row, SqlValue};
    use crate::dialect::{mapper_for, Dialect};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MemorySource {
        table: Table,
        rows: Vec<Row>,
        read_with: Mutex<Option<Table>>,
    }

    #[async_trait]
    impl SourceReader for MemorySource {
        async fn load_table(&self, table: &str) -> Result<Table> {
            if table == self.table.name {
                Ok(self.table.clone())
            } else {
                Err(CopyError::introspection(table, "table not found"))
            }
        }

        async fn row_count(&self, _table: &str) -> Result<u64> {
            Ok(self.rows.len() as u64)
        }

        fn read_table(&self, table: &Table, batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
            *self.read_with.lock().unwrap() = Some(table.clone());
            let (tx, rx) = mpsc::channel(self.rows.len().max(1));
            for (i, chunk) in self.rows.chunks(batch_size).enumerate() {
                let batch = Batch::new(chunk.to_vec(), (i * batch_size) as u64);
                let _ = tx.try_send(Ok(batch));
            }
            rx
        }

        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn close(&self) {}
    }

    #[derive(Default)]
    struct Recorded {
        exists: bool,
        created: u32,
        created_with: Option<Table>,
        inserts: Vec<usize>,
        committed: Vec<Row>,
        rolled_back: bool,
        fail_on: Option<usize>,
    }

    #[derive(Default)]
    struct MemoryTarget {
        state: Arc<Mutex<Recorded>>,
    }

    #[async_trait]
    impl TargetWriter for MemoryTarget {
        async fn table_exists(&self, _table: &str) -> Result<bool> {
            Ok(self.state.lock().unwrap().exists)
        }

        async fn create_table(&self, table: &Table) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.created += 1;
            state.created_with = Some(table.clone());
            state.exists = true;
            Ok(())
        }

        async fn begin(&self) -> Result<Box<dyn WriteTransaction>> {
            Ok(Box::new(MemoryTx {
                state: self.state.clone(),
                pending: Vec::new(),
            }))
        }

        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        async fn close(&self) {}
    }

    struct MemoryTx {
        state: Arc<Mutex<Recorded>>,
        pending: Vec<Row>,
    }

    #[async_trait]
    impl WriteTransaction for MemoryTx {
        async fn insert_batch(
            &mut self,
            _table: &str,
            _columns: &[String],
            batch: &Batch,
        ) -> Result<u64> {
            let mut state = self.state.lock().unwrap();
            state.inserts.push(batch.len());
            if state.fail_on == Some(state.inserts.len()) {
                return Err(CopyError::Config("injected failure".into()));
            }
            self.pending.extend(batch.rows.iter().cloned());
            Ok(batch.len() as u64)
        }

        async fn commit(self: Box<Self>) -> Result<()> {
            let MemoryTx { state, pending } = *self;
            state.lock().unwrap().committed.extend(pending);
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            self.state.lock().unwrap().rolled_back = true;
            Ok(())
        }
    }

    fn column(name: &str, ty: &str, pk: bool, ordinal_pos: i32) -> Column {
        Column {
            name: name.into(),
            data_type: ty.into(),
            is_nullable: !pk,
            is_primary_key: pk,
            ordinal_pos,
        }
    }

    fn source(rows: usize) -> Arc<MemorySource> {
        let table = Table::new(
            "users",
            vec![column("id", "INTEGER", true, 1), column("name", "TEXT", false, 2)],
        );
        let rows = (1..=rows as i64)
            .map(|i| vec![SqlValue::Int(i), SqlValue::Text(format!("User {}", i))])
            .collect();
        Arc::new(MemorySource {
            table,
            rows,
            read_with: Mutex::new(None),
        })
    }

    fn engine(source: Arc<MemorySource>, target: &MemoryTarget) -> CopyEngine {
        CopyEngine::new(
            source,
            Arc::new(MemoryTarget {
                state: target.state.clone(),
            }),
            mapper_for(Dialect::Sqlite, Dialect::Postgres),
        )
    }

    #[test]
    fn test_phase_names() {
        let phases = [
            CopyPhase::NotConnected,
            CopyPhase::Connected,
            CopyPhase::SchemaEnsured,
            CopyPhase::Copying,
            CopyPhase::Committed,
            CopyPhase::RolledBack,
        ];
        let shown: Vec<String> = phases.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            shown,
            vec![
                "not connected",
                "connected",
                "schema ensured",
                "copying",
                "committed",
                "rolled back"
            ]
        );
        assert_eq!(
            serde_json::to_string(&CopyPhase::NotConnected).unwrap(),
            "\"not_connected\""
        );
    }

    #[tokio::test]
    async fn test_copy_partitions_batches_and_reports_progress() {
        let target = MemoryTarget::default();
        let (tx, mut rx) = mpsc::channel(16);
        let engine = engine(source(2500), &target).with_progress(tx);

        let stats = engine.copy("users", 1000).await.unwrap();
        drop(engine);

        assert_eq!(stats.rows_copied, 2500);
        assert_eq!(stats.batches, 3);
        assert!(stats.table_created);

        let state = target.state.lock().unwrap();
        assert_eq!(state.inserts, vec![1000, 1000, 500]);
        assert_eq!(state.committed.len(), 2500);

        let mut progress = Vec::new();
        while let Ok(update) = rx.try_recv() {
            progress.push((update.records_copied, update.total_records));
        }
        assert_eq!(progress, vec![(1000, 2500), (2000, 2500), (2500, 2500)]);
    }

    #[tokio::test]
    async fn test_reader_gets_source_types_and_target_gets_translated_types() {
        let table = Table::new(
            "readings",
            vec![
                column("id", "INTEGER", true, 1),
                column("value", "REAL", false, 2),
                column("taken_at", "DATETIME", false, 3),
            ],
        );
        let source = Arc::new(MemorySource {
            table,
            rows: vec![vec![
                SqlValue::Int(1),
                SqlValue::Float(2.5),
                SqlValue::Text("2024-03-01 12:30:00".into()),
            ]],
            read_with: Mutex::new(None),
        });
        let target = MemoryTarget::default();

        engine(source.clone(), &target).copy("readings", 10).await.unwrap();

        let types = |t: &Table| -> Vec<String> {
            t.columns.iter().map(|c| c.data_type.clone()).collect()
        };
        let read_with = source.read_with.lock().unwrap().clone().unwrap();
        assert_eq!(types(&read_with), vec!["INTEGER", "REAL", "DATETIME"]);

        let created_with = target.state.lock().unwrap().created_with.clone().unwrap();
        assert_eq!(
            types(&created_with),
            vec!["INTEGER", "DOUBLE PRECISION", "TIMESTAMP"]
        );
    }

    #[tokio::test]
    async fn test_existing_table_is_not_created_again() {
        let target = MemoryTarget::default();
        target.state.lock().unwrap().exists = true;

        let stats = engine(source(3), &target).copy("users", 10).await.unwrap();
        assert!(!stats.table_created);
        assert_eq!(target.state.lock().unwrap().created, 0);
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back_with_range() {
        let target = MemoryTarget::default();
        target.state.lock().unwrap().fail_on = Some(3);

        let err = engine(source(50), &target).copy("users", 10).await.unwrap_err();
        match err {
            CopyError::Insert {
                first_row,
                last_row,
                ..
            } => assert_eq!((first_row, last_row), (21, 30)),
            other => panic!("expected insert error, got {:?}", other),
        }

        let state = target.state.lock().unwrap();
        assert!(state.rolled_back);
        assert!(state.committed.is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_table_never_touches_target() {
        let target = MemoryTarget::default();
        let err = engine(source(1), &target).copy("orders", 10).await.unwrap_err();
        assert!(matches!(err, CopyError::Introspection { .. }));
        assert_eq!(target.state.lock().unwrap().created, 0);
    }

    #[tokio::test]
    async fn test_empty_table_commits_without_batches() {
        let target = MemoryTarget::default();
        let stats = engine(source(0), &target).copy("users", 10).await.unwrap();
        assert_eq!(stats.batches, 0);
        assert!(target.state.lock().unwrap().inserts.is_empty());
    }
}
