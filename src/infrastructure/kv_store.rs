//! 键值存储 - 基础设施层
//!
//! 计时器状态跨进程重启保存在这里。所有计时器共享同一个存储，
//! 各自使用 `timer.<type>.*` 命名空间；提交流程不使用存储。

use crate::error::StorageError;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// 字符串键值存储
///
/// 单次 get/set/remove 是原子的；读-改-写由调用方保证单写者。
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Vec<String>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // 锁中毒只可能来自持锁期间 panic，数据本身仍然可用
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.lock().clear();
        Ok(())
    }
}

/// JSON 文件存储
///
/// 启动时整体读入，每次写操作后整体落盘。
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// 打开存储文件，不存在时从空状态开始
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let path_str = path.display().to_string();

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| {
                StorageError::Corrupted {
                    path: path_str.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("存储文件不存在，使用空状态: {}", path_str);
                BTreeMap::new()
            }
            Err(source) => {
                return Err(StorageError::ReadFailed {
                    path: path_str,
                    source,
                })
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let path_str = self.path.display().to_string();
        let content = serde_json::to_string_pretty(entries).map_err(|source| {
            StorageError::Corrupted {
                path: path_str.clone(),
                source,
            }
        })?;

        // 先写临时文件再改名，避免中途退出留下半个文件
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, content).map_err(|source| StorageError::WriteFailed {
            path: tmp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| {
            warn!("存储文件替换失败: {}", path_str);
            StorageError::WriteFailed {
                path: path_str,
                source,
            }
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.lock();
        entries.clear();
        self.flush(&entries)
    }
}
