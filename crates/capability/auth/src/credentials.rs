//! 口令库：`loginID -> passwordHash`，文件格式每行 `loginID:hash`。
//!
//! 读者拿到的是 `Arc<HashMap>` 快照；外部编辑文件后由监听器触发重载，
//! 重载失败时保留旧快照。

use crate::StoreError;
use crate::fsutil::{read_existing, write_atomic};
use hub_watcher::FileWatcher;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

type Entries = Arc<HashMap<String, String>>;

struct CredentialState {
    path: PathBuf,
    entries: RwLock<Entries>,
}

impl CredentialState {
    fn snapshot(&self) -> Entries {
        match self.entries.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn reload(&self) {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                warn!(target: "hub.auth", path = %self.path.display(), error = %err, "credential_reload_failed");
                return;
            }
        };
        let entries = parse_credentials(&content);
        let count = entries.len();
        match self.entries.write() {
            Ok(mut guard) => *guard = Arc::new(entries),
            Err(_) => {
                warn!(target: "hub.auth", "credential_reload_lock_failed");
                return;
            }
        }
        info!(target: "hub.auth", path = %self.path.display(), count, "credentials_reloaded");
    }
}

/// 口令库。
pub struct CredentialStore {
    state: Arc<CredentialState>,
    watcher: FileWatcher,
}

impl CredentialStore {
    /// 打开口令库并开始监听文件；文件不存在时返回 `StoreError::Open`。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let content = read_existing(&path)?;
        let state = Arc::new(CredentialState {
            entries: RwLock::new(Arc::new(parse_credentials(&content))),
            path: path.clone(),
        });
        let reload = state.clone();
        let watcher = FileWatcher::watch(&path, Arc::new(move || reload.reload()))?;
        info!(target: "hub.auth", path = %path.display(), count = state.snapshot().len(), "credentials_opened");
        Ok(Self { state, watcher })
    }

    /// 查询口令哈希。
    pub fn get_hash(&self, login_id: &str) -> Option<String> {
        self.state.snapshot().get(login_id).cloned()
    }

    /// 设置口令哈希并原子写回文件。
    pub fn set_hash(&self, login_id: &str, hash: &str) -> Result<(), StoreError> {
        validate_login_id(login_id)?;
        if hash.is_empty() || hash.contains(['\n', '\r']) {
            return Err(StoreError::Invalid("password hash is empty or multi-line".to_string()));
        }
        self.update(|entries| {
            entries.insert(login_id.to_string(), hash.to_string());
        })
    }

    /// 删除账号；返回是否存在。
    pub fn remove(&self, login_id: &str) -> Result<bool, StoreError> {
        let mut existed = false;
        self.update(|entries| {
            existed = entries.remove(login_id).is_some();
        })?;
        Ok(existed)
    }

    /// 账号数量。
    pub fn count(&self) -> usize {
        self.state.snapshot().len()
    }

    /// 当前快照（authorize 等调用方使用同一视图）。
    pub fn snapshot(&self) -> Arc<HashMap<String, String>> {
        self.state.snapshot()
    }

    /// 停止监听；内存快照仍可读。
    pub fn close(&self) {
        self.watcher.close();
    }

    fn update(&self, mutate: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), StoreError> {
        let mut guard = self.state.entries.write().map_err(|_| StoreError::Lock)?;
        let mut entries = HashMap::clone(&guard);
        mutate(&mut entries);
        write_atomic(&self.state.path, serialize_credentials(&entries).as_bytes())?;
        *guard = Arc::new(entries);
        Ok(())
    }
}

fn validate_login_id(login_id: &str) -> Result<(), StoreError> {
    if login_id.is_empty() {
        return Err(StoreError::Invalid("loginID is empty".to_string()));
    }
    if login_id.contains([':', '\n', '\r']) || login_id.starts_with('#') {
        return Err(StoreError::Invalid(format!("loginID {login_id:?} is not representable")));
    }
    Ok(())
}

/// 解析口令文件；空行与 `#` 开头的行忽略，格式错误的行跳过。
pub(crate) fn parse_credentials(content: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once(':') {
            Some((login_id, hash)) if !login_id.is_empty() && !hash.is_empty() => {
                entries.insert(login_id.to_string(), hash.to_string());
            }
            _ => warn!(target: "hub.auth", line = index + 1, "credential_line_malformed"),
        }
    }
    entries
}

fn serialize_credentials(entries: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<&String, &String> = entries.iter().collect();
    let mut out = String::new();
    for (login_id, hash) in sorted {
        out.push_str(login_id);
        out.push(':');
        out.push_str(hash);
        out.push('\n');
    }
    out
}
