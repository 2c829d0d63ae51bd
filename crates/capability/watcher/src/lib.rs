//! 文件监听：对单个文件的修改做防抖通知。
//!
//! 监听目标文件所在的父目录，按文件名过滤事件，这样编辑器的
//! "截断后写入"与"临时文件改名覆盖"两种保存方式都能被捕获。
//! 每个事件都会重置 100 ms 的单次定时器，定时器到期后回调执行一次。

use domain::ErrorKind;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 防抖间隔。
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// 文件变更回调。
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// 监听错误。
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch path has no file name: {0}")]
    InvalidPath(String),
    #[error("watch directory unreadable {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl WatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WatchError::InvalidPath(_) => ErrorKind::Validation,
            WatchError::Unreadable { .. } | WatchError::Notify(_) => ErrorKind::Io,
            WatchError::NoRuntime => ErrorKind::Internal,
        }
    }
}

struct Active {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

/// 单文件监听器；`close` 幂等，drop 时自动关闭。
pub struct FileWatcher {
    path: PathBuf,
    active: Mutex<Option<Active>>,
}

impl FileWatcher {
    /// 开始监听 `path`，文件变更（防抖后）调用 `callback`。
    ///
    /// 必须在 tokio 运行时内调用；父目录不可读时返回 `WatchError`。
    pub fn watch(path: impl AsRef<Path>, callback: ChangeCallback) -> Result<Self, WatchError> {
        let path = path.as_ref().to_path_buf();
        let file_name: OsString = path
            .file_name()
            .ok_or_else(|| WatchError::InvalidPath(path.display().to_string()))?
            .to_os_string();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::read_dir(&parent).map_err(|source| WatchError::Unreadable {
            path: parent.display().to_string(),
            source,
        })?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let target = file_name.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let hit = event
                    .paths
                    .iter()
                    .any(|changed| changed.file_name() == Some(target.as_os_str()));
                if hit {
                    let _ = tx.send(());
                }
            }
            Err(err) => warn!(target: "hub.watcher", error = %err, "watch_event_error"),
        })?;
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;

        let task = runtime.spawn(debounce_loop(rx, callback, path.clone()));
        debug!(target: "hub.watcher", path = %path.display(), "watch_started");
        Ok(Self {
            path,
            active: Mutex::new(Some(Active {
                _watcher: watcher,
                task,
            })),
        })
    }

    /// 被监听的文件路径。
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 停止监听；重复调用无副作用。
    pub fn close(&self) {
        let active = match self.active.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(active) = active {
            active.task.abort();
            debug!(target: "hub.watcher", path = %self.path.display(), "watch_closed");
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

async fn debounce_loop(
    mut rx: mpsc::UnboundedReceiver<()>,
    callback: ChangeCallback,
    path: PathBuf,
) {
    while rx.recv().await.is_some() {
        // 定时器窗口内的后续事件会重新计时
        loop {
            match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }
        debug!(target: "hub.watcher", path = %path.display(), "file_changed");
        callback();
    }
}
