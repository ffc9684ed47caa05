//! On/off registry of capture streams keyed by device index.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::{CameraInfo, CaptureBackend, CaptureHandle};
use crate::error::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    Inactive,
}

/// Tracks at most one open capture handle per device index.
pub struct DeviceStreamRegistry {
    backend: Arc<dyn CaptureBackend>,
    active: Mutex<HashMap<u32, Box<dyn CaptureHandle>>>,
}

impl DeviceStreamRegistry {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Start capturing on `index`. Idempotent: starting an already-active
    /// stream returns success without opening a second handle. The map lock
    /// is held across the open so two concurrent starts cannot race into
    /// double-opening the same device.
    pub async fn start(&self, index: u32) -> Result<(), CaptureError> {
        let mut active = self.active.lock().await;
        if active.contains_key(&index) {
            return Ok(());
        }
        let handle = self.backend.open(index).await?;
        info!(index, path = %handle.path(), "capture stream started");
        active.insert(index, handle);
        Ok(())
    }

    /// Stop capturing on `index`. Stopping an inactive stream is a no-op.
    pub async fn stop(&self, index: u32) -> Result<(), CaptureError> {
        let handle = self.active.lock().await.remove(&index);
        match handle {
            Some(handle) => {
                info!(index, "capture stream stopped");
                handle.close()
            }
            None => Ok(()),
        }
    }

    pub async fn status(&self, index: u32) -> DeviceStatus {
        if self.active.lock().await.contains_key(&index) {
            DeviceStatus::Active
        } else {
            DeviceStatus::Inactive
        }
    }

    pub async fn active_indexes(&self) -> Vec<u32> {
        let mut indexes: Vec<u32> = self.active.lock().await.keys().copied().collect();
        indexes.sort_unstable();
        indexes
    }

    /// Stop every active stream. Close failures are collected and returned
    /// rather than aborting the sweep, so one stuck device never leaves the
    /// rest open.
    pub async fn stop_all(&self) -> Vec<(u32, CaptureError)> {
        let drained: Vec<(u32, Box<dyn CaptureHandle>)> =
            self.active.lock().await.drain().collect();
        let mut failures = Vec::new();
        for (index, handle) in drained {
            if let Err(err) = handle.close() {
                warn!(index, error = %err, "capture stream close failed");
                failures.push((index, err));
            } else {
                info!(index, "capture stream stopped");
            }
        }
        failures
    }

    /// Enumerate cameras present on the host, regardless of active state.
    pub async fn scan(&self) -> Vec<CameraInfo> {
        self.backend.probe().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct MockBackend {
        opens: AtomicUsize,
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    #[derive(Debug)]
    struct MockHandle {
        path: String,
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    impl CaptureHandle for MockHandle {
        fn path(&self) -> &str {
            &self.path
        }

        fn close(self: Box<Self>) -> Result<(), CaptureError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(CaptureError::Release {
                    index: 0,
                    reason: "stuck".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CaptureBackend for MockBackend {
        async fn open(&self, index: u32) -> Result<Box<dyn CaptureHandle>, CaptureError> {
            if index == 99 {
                return Err(CaptureError::Unavailable {
                    index,
                    reason: "no such device".into(),
                });
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockHandle {
                path: format!("/dev/video{index}"),
                closes: self.closes.clone(),
                fail_close: self.fail_close,
            }))
        }

        async fn probe(&self) -> Vec<CameraInfo> {
            vec![CameraInfo {
                index: 0,
                path: "/dev/video0".into(),
            }]
        }
    }

    fn registry() -> (Arc<MockBackend>, DeviceStreamRegistry) {
        let backend = Arc::new(MockBackend::default());
        let registry = DeviceStreamRegistry::new(backend.clone());
        (backend, registry)
    }

    #[tokio::test]
    async fn double_start_keeps_a_single_handle() {
        let (backend, registry) = registry();
        registry.start(3).await.unwrap();
        registry.start(3).await.unwrap();
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
        assert_eq!(registry.status(3).await, DeviceStatus::Active);
    }

    #[tokio::test]
    async fn double_stop_is_not_an_error() {
        let (backend, registry) = registry();
        registry.start(3).await.unwrap();
        registry.stop(3).await.unwrap();
        registry.stop(3).await.unwrap();
        assert_eq!(registry.status(3).await, DeviceStatus::Inactive);
        assert_eq!(backend.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_failure_leaves_the_index_inactive() {
        let (_, registry) = registry();
        assert!(registry.start(99).await.is_err());
        assert_eq!(registry.status(99).await, DeviceStatus::Inactive);
    }

    #[tokio::test]
    async fn stop_all_sweeps_every_stream_despite_failures() {
        let closes = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(MockBackend {
            opens: AtomicUsize::new(0),
            closes: closes.clone(),
            fail_close: true,
        });
        let registry = DeviceStreamRegistry::new(backend);
        registry.start(0).await.unwrap();
        registry.start(1).await.unwrap();
        registry.start(2).await.unwrap();

        let failures = registry.stop_all().await;
        assert_eq!(failures.len(), 3);
        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert!(registry.active_indexes().await.is_empty());
    }

    #[tokio::test]
    async fn active_indexes_are_sorted() {
        let (_, registry) = registry();
        for index in [5, 1, 3] {
            registry.start(index).await.unwrap();
        }
        assert_eq!(registry.active_indexes().await, vec![1, 3, 5]);
    }
}
