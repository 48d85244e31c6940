use std::{
    fs::File,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::warn;

use tempctl_common::{RuntimeConfig, StoreBackend, STORE_WORDS};

/// Keeps the configuration store image in `store.json` as a list of words.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_image(&self) -> anyhow::Result<Option<Vec<i16>>> {
        match std::fs::read(&self.path) {
            Ok(raw) => {
                let words: Vec<i16> = serde_json::from_slice(&raw)
                    .with_context(|| format!("invalid store image {}", self.path.display()))?;
                Ok(Some(words))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    fn write_image(&self, words: &[i16]) -> anyhow::Result<()> {
        write_atomically(&self.path, &serde_json::to_vec(words)?)
    }
}

impl StoreBackend for FileBackend {
    fn load(&mut self) -> Option<Vec<i16>> {
        match self.read_image() {
            Ok(Some(words)) if words.len() == STORE_WORDS => Some(words),
            Ok(Some(words)) => {
                warn!(
                    "store image has {} words, expected {STORE_WORDS}; starting from defaults",
                    words.len()
                );
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!("failed to load store image: {err:#}");
                None
            }
        }
    }

    fn persist(&mut self, words: &[i16]) {
        // the in-memory image stays authoritative; the next write retries
        if let Err(err) = self.write_image(words) {
            warn!("failed to persist store image: {err:#}");
        }
    }
}

/// Replaces `path` through a synced sibling temp file so a crash never leaves half a file.
fn write_atomically(path: &Path, payload: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut file =
        File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    file.write_all(payload)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync {}", tmp.display()))?;
    drop(file);
    std::fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    if let Some(parent) = path.parent() {
        // the rename itself lives in the directory entry
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct AppStore {
    data_dir: Arc<PathBuf>,
    runtime_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl AppStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("TEMPCTL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.tempctl"));
        Self::in_dir(data_dir)
    }

    pub fn in_dir(data_dir: PathBuf) -> Self {
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            data_dir: Arc::new(data_dir),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store_backend(&self) -> FileBackend {
        FileBackend::new(self.data_dir.join("store.json"))
    }

    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.runtime_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(runtime)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }
}
