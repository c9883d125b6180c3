use crate::domain::payment::PaymentId;
use crate::domain::ports::{PortResult, WorkflowStore};
use crate::domain::workflow::ApprovalWorkflow;
use crate::error::AdapterError;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing approval workflows.
pub const CF_WORKFLOWS: &str = "workflows";

/// A persistent workflow store backed by RocksDB.
///
/// Workflows are stored as JSON under the big-endian payment id, so a restarted
/// process resumes each payment at the step where it stopped.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBWorkflowStore {
    db: Arc<DB>,
}

impl RocksDBWorkflowStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rocksdb::Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_workflows = ColumnFamilyDescriptor::new(CF_WORKFLOWS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_workflows])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn storage_error(e: impl std::fmt::Display) -> AdapterError {
        AdapterError::Unavailable(format!("rocksdb: {}", e))
    }
}

#[async_trait]
impl WorkflowStore for RocksDBWorkflowStore {
    async fn get(&self, payment_id: PaymentId) -> PortResult<Option<ApprovalWorkflow>> {
        let cf = self
            .db
            .cf_handle(CF_WORKFLOWS)
            .ok_or_else(|| Self::storage_error("workflows column family not found"))?;

        let key = payment_id.0.to_be_bytes();
        let result = self.db.get_cf(&cf, key).map_err(Self::storage_error)?;

        match result {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AdapterError::Malformed(format!("Deserialization error: {}", e))),
            None => Ok(None),
        }
    }

    async fn store(&self, workflow: ApprovalWorkflow) -> PortResult<()> {
        let cf = self
            .db
            .cf_handle(CF_WORKFLOWS)
            .ok_or_else(|| Self::storage_error("workflows column family not found"))?;

        let key = workflow.payment_id.0.to_be_bytes();
        let value = serde_json::to_vec(&workflow)
            .map_err(|e| AdapterError::Malformed(format!("Serialization error: {}", e)))?;

        self.db.put_cf(&cf, key, value).map_err(Self::storage_error)?;
        Ok(())
    }
}
