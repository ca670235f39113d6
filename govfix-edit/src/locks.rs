use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-path async locks. Writes to one path are serialized;
/// different paths proceed independently.
#[derive(Debug, Clone, Default)]
pub struct FileLocks {
    inner: Arc<Mutex<HashMap<Utf8PathBuf, Arc<AsyncMutex<()>>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, path: &Utf8Path) -> Arc<AsyncMutex<()>> {
        let mut map = match self.inner.lock() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(path.to_path_buf()).or_default().clone()
    }

    /// Wait for exclusive access to `path`.
    pub async fn lock(&self, path: &Utf8Path) -> OwnedMutexGuard<()> {
        self.slot(path).lock_owned().await
    }
}
