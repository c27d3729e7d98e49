use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::requisition::RequisitionId;

type LockTable = Arc<Mutex<HashMap<RequisitionId, Arc<AsyncMutex<()>>>>>;

/// Per-requisition mutual exclusion within one process. Cross-process safety comes from the
/// conditional write in the store; this only keeps local callers from doing redundant work.
#[derive(Clone, Debug, Default)]
pub struct RequisitionLocks {
    entries: LockTable,
}

impl RequisitionLocks {
    pub async fn acquire(&self, id: &RequisitionId) -> RequisitionLockGuard {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(id.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;

        RequisitionLockGuard {
            id: id.clone(),
            entries: Arc::clone(&self.entries),
            guard: Some(guard),
        }
    }

    /// Number of requisitions currently locked or waited on.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct RequisitionLockGuard {
    id: RequisitionId,
    entries: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RequisitionLockGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = entries.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            entries.remove(&self.id);
        }
    }
}
