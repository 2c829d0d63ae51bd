//! 持久化 JSON 映射
//!
//! 内存中的 `key -> value` 表，后台任务按固定间隔检查脏计数，
//! 非零时在读锁下复制快照、写入同目录临时文件并原子重命名。
//! `close()` 停止后台任务并同步完成最后一次落盘。

use crate::error::StorageError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 默认自动保存间隔。
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(3);

struct MapState<V> {
    path: PathBuf,
    map: RwLock<HashMap<String, V>>,
    dirty: AtomicU64,
    // 串行化落盘，避免后台任务与 close 同时写临时文件
    flushing: Mutex<()>,
}

impl<V: Serialize> MapState<V> {
    fn flush(&self) -> Result<(), StorageError> {
        let _guard = self
            .flushing
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?;
        let pending = self.dirty.swap(0, Ordering::AcqRel);
        if pending == 0 {
            return Ok(());
        }
        let result = self.write_snapshot();
        if result.is_err() {
            self.dirty.fetch_add(pending, Ordering::AcqRel);
        }
        result
    }

    fn write_snapshot(&self) -> Result<(), StorageError> {
        let bytes = {
            let map = self
                .map
                .read()
                .map_err(|_| StorageError::new("lock failed"))?;
            serde_json::to_vec(&*map).map_err(|err| StorageError::new(err.to_string()))?
        };
        let tmp = sibling(&self.path, "tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(target: "hub.storage", path = %self.path.display(), bytes = bytes.len(), "json_map_saved");
        Ok(())
    }
}

struct Autosave {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// 以 JSON 文件持久化的键值映射。
pub struct JsonMapStore<V> {
    state: Arc<MapState<V>>,
    autosave: Mutex<Option<Autosave>>,
}

impl<V> JsonMapStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// 打开映射文件。
    ///
    /// 文件不存在时创建 `{}`；内容损坏时归档为 `<file>.corrupt` 并以空映射启动。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let map = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => match serde_json::from_str::<HashMap<String, V>>(&content) {
                Ok(map) => map,
                Err(err) => {
                    let archive = sibling(&path, "corrupt");
                    warn!(
                        target: "hub.storage",
                        path = %path.display(),
                        archive = %archive.display(),
                        error = %err,
                        "json_map_corrupt"
                    );
                    std::fs::rename(&path, &archive)?;
                    std::fs::write(&path, b"{}")?;
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                std::fs::write(&path, b"{}")?;
                HashMap::new()
            }
            Err(err) => return Err(err.into()),
        };
        info!(target: "hub.storage", path = %path.display(), count = map.len(), "json_map_opened");
        Ok(Self {
            state: Arc::new(MapState {
                path,
                map: RwLock::new(map),
                dirty: AtomicU64::new(0),
                flushing: Mutex::new(()),
            }),
            autosave: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.state.path
    }

    pub fn get(&self, key: &str) -> Result<Option<V>, StorageError> {
        let map = self
            .state
            .map
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: V) -> Result<(), StorageError> {
        let mut map = self
            .state
            .map
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(key.to_string(), value);
        self.state.dirty.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// 删除键，返回是否存在。
    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut map = self
            .state
            .map
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let existed = map.remove(key).is_some();
        if existed {
            self.state.dirty.fetch_add(1, Ordering::AcqRel);
        }
        Ok(existed)
    }

    /// 在读锁下访问整个映射。
    pub fn read<R>(&self, f: impl FnOnce(&HashMap<String, V>) -> R) -> Result<R, StorageError> {
        let map = self
            .state
            .map
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(f(&map))
    }

    pub fn len(&self) -> usize {
        self.read(HashMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 尚未落盘的修改次数。
    pub fn dirty_count(&self) -> u64 {
        self.state.dirty.load(Ordering::Acquire)
    }

    /// 立即落盘（无修改时不写文件）。
    pub fn flush(&self) -> Result<(), StorageError> {
        self.state.flush()
    }

    /// 启动自动保存任务；重复启动返回冲突错误。
    pub fn start(&self, interval: Duration) -> Result<(), StorageError> {
        let mut autosave = self
            .autosave
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?;
        if autosave.is_some() {
            return Err(StorageError::conflict("autosave already running"));
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| StorageError::new("autosave requires a tokio runtime"))?;
        let cancel = CancellationToken::new();
        let task = handle.spawn(autosave_loop(self.state.clone(), interval, cancel.clone()));
        *autosave = Some(Autosave { cancel, task });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.autosave
            .lock()
            .map(|autosave| autosave.is_some())
            .unwrap_or(false)
    }

    /// 停止自动保存并同步落盘；可重复调用。
    pub fn close(&self) -> Result<(), StorageError> {
        let running = self
            .autosave
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?
            .take();
        if let Some(Autosave { cancel, task }) = running {
            cancel.cancel();
            task.abort();
        }
        self.state.flush()
    }
}

async fn autosave_loop<V>(state: Arc<MapState<V>>, interval: Duration, cancel: CancellationToken)
where
    V: Serialize + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        if state.dirty.load(Ordering::Acquire) == 0 {
            continue;
        }
        let flushing = state.clone();
        match tokio::task::spawn_blocking(move || flushing.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(target: "hub.storage", path = %state.path.display(), error = %err, "json_map_save_failed")
            }
            Err(err) => {
                warn!(target: "hub.storage", path = %state.path.display(), error = %err, "json_map_save_panicked")
            }
        }
    }
}

/// `<file>.<suffix>`，与原文件同目录。
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::sibling;
    use std::path::Path;

    #[test]
    fn sibling_keeps_directory() {
        assert_eq!(
            sibling(Path::new("/data/directory.json"), "tmp"),
            Path::new("/data/directory.json.tmp")
        );
    }
}
