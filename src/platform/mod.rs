//! Host environment seam.
//!
//! The chart state never talks to a window or an address bar directly; it
//! goes through `Platform`. `MemoryPlatform` keeps everything in memory and
//! is what the CLI and the tests use.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObserverId(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

pub type ResizeCallback = Box<dyn Fn(Size) + Send + Sync>;

pub trait Platform: Send + Sync {
    /// Call `callback` whenever `container` changes size.
    fn observe_resize(&self, container: &str, callback: ResizeCallback) -> ObserverId;

    fn unobserve(&self, id: ObserverId);

    /// The full address, including the query string.
    fn current_url(&self) -> String;

    /// Replace the address without navigating.
    fn set_current_url(&self, url: &str);
}

struct Observer {
    container: String,
    callback: Arc<dyn Fn(Size) + Send + Sync>,
}

pub struct MemoryPlatform {
    url: RwLock<String>,
    observers: Mutex<BTreeMap<ObserverId, Observer>>,
    next_id: AtomicU64,
}

impl MemoryPlatform {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: RwLock::new(url.into()),
            observers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Notify every observer of `container`. Returns how many were called.
    pub fn resize(&self, container: &str, size: Size) -> usize {
        // Callbacks run outside the lock so they may (un)observe.
        let callbacks: Vec<_> = self
            .observers
            .lock()
            .values()
            .filter(|o| o.container == container)
            .map(|o| o.callback.clone())
            .collect();
        for callback in &callbacks {
            callback(size);
        }
        callbacks.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new("")
    }
}

impl Platform for MemoryPlatform {
    fn observe_resize(&self, container: &str, callback: ResizeCallback) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().insert(
            id,
            Observer {
                container: container.to_string(),
                callback: Arc::from(callback),
            },
        );
        id
    }

    fn unobserve(&self, id: ObserverId) {
        self.observers.lock().remove(&id);
    }

    fn current_url(&self) -> String {
        self.url.read().clone()
    }

    fn set_current_url(&self, url: &str) {
        *self.url.write() = url.to_string();
    }
}
