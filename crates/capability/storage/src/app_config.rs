//! 按用户、按应用保存的不透明配置文本。

use crate::error::StorageError;
use crate::json_map::JsonMapStore;
use std::path::Path;
use std::time::Duration;

pub struct ConfigStore {
    map: JsonMapStore<String>,
}

impl ConfigStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Ok(Self {
            map: JsonMapStore::open(path)?,
        })
    }

    pub fn start(&self, interval: Duration) -> Result<(), StorageError> {
        self.map.start(interval)
    }

    pub fn close(&self) -> Result<(), StorageError> {
        self.map.close()
    }

    pub fn get(&self, login_id: &str, app_id: &str) -> Result<Option<String>, StorageError> {
        self.map.get(&config_key(login_id, app_id)?)
    }

    pub fn set(&self, login_id: &str, app_id: &str, config: String) -> Result<(), StorageError> {
        self.map.set(&config_key(login_id, app_id)?, config)
    }
}

fn config_key(login_id: &str, app_id: &str) -> Result<String, StorageError> {
    if login_id.is_empty() {
        return Err(StorageError::validation("loginID required"));
    }
    if app_id.is_empty() || app_id.contains('/') {
        return Err(StorageError::validation("invalid appID"));
    }
    Ok(format!("{login_id}/{app_id}"))
}
