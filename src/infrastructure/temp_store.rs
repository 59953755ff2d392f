//! 临时存储 - 基础设施层
//!
//! 只暴露"存入字节 → 得到句柄；读取；释放句柄"的能力，
//! 调用方从不关心数据落在磁盘还是内存。

use crate::error::StorageError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// 不透明的临时数据句柄
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TempHandle(u64);

impl TempHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// 临时存储能力
pub trait TempStore: Send + Sync {
    fn store(&self, bytes: &[u8]) -> Result<TempHandle, StorageError>;
    fn read(&self, handle: &TempHandle) -> Result<Vec<u8>, StorageError>;
    fn release(&self, handle: &TempHandle) -> Result<(), StorageError>;
    /// 当前尚未释放的句柄数量
    fn live_handles(&self) -> usize;
}

/// 持有句柄的守卫，离开作用域时自动释放
///
/// 任务被取消（future 被 drop）时同样会释放
pub struct TempGuard {
    store: Arc<dyn TempStore>,
    handle: TempHandle,
}

impl TempGuard {
    /// 存入字节并返回守卫
    pub fn stage(store: Arc<dyn TempStore>, bytes: &[u8]) -> Result<Self, StorageError> {
        let handle = store.store(bytes)?;
        Ok(Self { store, handle })
    }

    /// 在阻塞线程池中存入字节
    ///
    /// 守卫在线程池内创建，调用方中途放弃等待时句柄同样会被释放
    pub async fn stage_async(
        store: Arc<dyn TempStore>,
        bytes: Vec<u8>,
    ) -> Result<Self, StorageError> {
        tokio::task::spawn_blocking(move || Self::stage(store, &bytes))
            .await
            .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }

    pub fn read(&self) -> Result<Vec<u8>, StorageError> {
        self.store.read(&self.handle)
    }

    /// 在阻塞线程池中读取
    pub async fn read_async(&self) -> Result<Vec<u8>, StorageError> {
        let store = self.store.clone();
        let id = self.handle.0;
        tokio::task::spawn_blocking(move || store.read(&TempHandle(id)))
            .await
            .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }

    pub fn handle(&self) -> &TempHandle {
        &self.handle
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if let Err(e) = self.store.release(&self.handle) {
            warn!("释放临时数据失败 (句柄 {}): {}", self.handle.0, e);
        }
    }
}

/// 基于临时文件的存储
pub struct FileTempStore {
    dir: Option<PathBuf>,
    files: Mutex<HashMap<u64, NamedTempFile>>,
    next_id: AtomicU64,
}

impl FileTempStore {
    /// 使用系统临时目录
    pub fn new() -> Self {
        Self {
            dir: None,
            files: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 使用自定义目录
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::new()
        }
    }
}

impl Default for FileTempStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TempStore for FileTempStore {
    fn store(&self, bytes: &[u8]) -> Result<TempHandle, StorageError> {
        let mut file = match &self.dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(StorageError::WriteFailed)?;
        file.write_all(bytes).map_err(StorageError::WriteFailed)?;
        file.flush().map_err(StorageError::WriteFailed)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("写入临时文件 (句柄 {}, {} 字节)", id, bytes.len());
        self.files.lock().insert(id, file);
        Ok(TempHandle(id))
    }

    fn read(&self, handle: &TempHandle) -> Result<Vec<u8>, StorageError> {
        let path = {
            let files = self.files.lock();
            let file = files
                .get(&handle.0)
                .ok_or(StorageError::UnknownHandle(handle.0))?;
            file.path().to_path_buf()
        };
        std::fs::read(path).map_err(|source| StorageError::ReadFailed {
            handle: handle.0,
            source,
        })
    }

    fn release(&self, handle: &TempHandle) -> Result<(), StorageError> {
        let file = self
            .files
            .lock()
            .remove(&handle.0)
            .ok_or(StorageError::UnknownHandle(handle.0))?;
        // NamedTempFile 在 close/drop 时删除磁盘文件
        file.close().map_err(StorageError::WriteFailed)?;
        debug!("已释放临时文件 (句柄 {})", handle.0);
        Ok(())
    }

    fn live_handles(&self) -> usize {
        self.files.lock().len()
    }
}

/// 内存存储（测试与网关小文件场景）
#[derive(Default)]
pub struct MemoryTempStore {
    blobs: Mutex<HashMap<u64, Vec<u8>>>,
    next_id: AtomicU64,
}

impl MemoryTempStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TempStore for MemoryTempStore {
    fn store(&self, bytes: &[u8]) -> Result<TempHandle, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.blobs.lock().insert(id, bytes.to_vec());
        Ok(TempHandle(id))
    }

    fn read(&self, handle: &TempHandle) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .lock()
            .get(&handle.0)
            .cloned()
            .ok_or(StorageError::UnknownHandle(handle.0))
    }

    fn release(&self, handle: &TempHandle) -> Result<(), StorageError> {
        self.blobs
            .lock()
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(StorageError::UnknownHandle(handle.0))
    }

    fn live_handles(&self) -> usize {
        self.blobs.lock().len()
    }
}
