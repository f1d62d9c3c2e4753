use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::db::store::SnapshotStore;
use crate::types::Snapshot;

/// Receives freshly built snapshots from the cache and persists them.
/// Runs as a dedicated background task so writes never sit on the refresh path.
pub struct SnapshotWriter {
    store: Arc<dyn SnapshotStore>,
    snapshot_rx: mpsc::Receiver<Arc<Snapshot>>,
}

impl SnapshotWriter {
    pub fn new(store: Arc<dyn SnapshotStore>, snapshot_rx: mpsc::Receiver<Arc<Snapshot>>) -> Self {
        Self { store, snapshot_rx }
    }

    pub async fn run(mut self) {
        while let Some(snapshot) = self.snapshot_rx.recv().await {
            if let Err(e) = self.store.save(&snapshot).await {
                warn!(items = snapshot.item_count, "Snapshot persist failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<Snapshot>>,
        fail: bool,
    }

    #[async_trait]
    impl SnapshotStore for RecordingStore {
        async fn load_latest(&self) -> Result<Snapshot, PersistenceError> {
            Err(PersistenceError::Empty)
        }

        async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Corrupt("disk full".to_string()));
            }
            self.saved.lock().unwrap().push(snapshot.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn writes_every_received_snapshot() {
        let store = Arc::new(RecordingStore::default());
        let (tx, rx) = mpsc::channel(4);
        let writer = SnapshotWriter::new(store.clone(), rx);

        tx.send(Arc::new(Snapshot::new(Utc::now(), Vec::new()))).await.unwrap();
        tx.send(Arc::new(Snapshot::new(Utc::now(), Vec::new()))).await.unwrap();
        drop(tx);
        writer.run().await;

        assert_eq!(store.saved.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn save_failures_do_not_stop_the_writer() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let (tx, rx) = mpsc::channel(4);
        let writer = SnapshotWriter::new(store.clone(), rx);

        tx.send(Arc::new(Snapshot::new(Utc::now(), Vec::new()))).await.unwrap();
        drop(tx);
        writer.run().await;

        assert!(store.saved.lock().unwrap().is_empty());
    }
}
