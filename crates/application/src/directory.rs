//! 活跃房间的内存索引。
//!
//! 每个房间一个 `tokio::sync::Mutex`，持有期间可以跨越存储写入；
//! 索引本身只用同步读写锁保护，临界区内不会 await。
//! 已删除的房间 id 会被记录为墓碑，在进程生命周期内不会再被加载。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use domain::{ChatRoom, Message, RoomId, RoomSnapshot, StoreError, StorePath};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::ApplicationError;
use crate::store::CredentialStore;

#[derive(Debug)]
pub struct RoomEntry {
    pub snapshot: RoomSnapshot,
    removed: bool,
}

impl RoomEntry {
    fn new(snapshot: RoomSnapshot) -> Self {
        Self {
            snapshot,
            removed: false,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn mark_removed(&mut self) {
        self.removed = true;
    }
}

pub type RoomHandle = Arc<Mutex<RoomEntry>>;

#[derive(Default)]
struct DirectoryState {
    rooms: HashMap<RoomId, RoomHandle>,
    // 只增不减，删除过的房间 id 保留到进程退出
    tombstones: HashSet<RoomId>,
}

pub struct RoomDirectory {
    store: Arc<dyn CredentialStore>,
    state: RwLock<DirectoryState>,
}

impl RoomDirectory {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            state: RwLock::new(DirectoryState::default()),
        }
    }

    /// 启动时从存储加载全部房间
    pub async fn hydrate(&self) -> Result<usize, ApplicationError> {
        let entries = self.store.children(&StorePath::rooms()).await?;
        let mut loaded = 0;
        for entry in entries {
            let room: ChatRoom = decode(&entry.path, entry.value)?;
            let messages = self.load_messages(room.id).await?;
            self.insert(RoomSnapshot { room, messages });
            loaded += 1;
        }
        info!(rooms = loaded, "房间索引已从存储恢复");
        Ok(loaded)
    }

    pub fn get(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.read().rooms.get(&room_id).cloned()
    }

    pub fn is_tombstoned(&self, room_id: RoomId) -> bool {
        self.read().tombstones.contains(&room_id)
    }

    /// 内存中没有时从存储读取。存储中也不存在或已被删除时返回 `None`。
    pub async fn load(&self, room_id: RoomId) -> Result<Option<RoomHandle>, ApplicationError> {
        if let Some(handle) = self.get(room_id) {
            return Ok(Some(handle));
        }
        if self.is_tombstoned(room_id) {
            return Ok(None);
        }

        let path = StorePath::room(room_id);
        let Some(value) = self.store.read(&path).await? else {
            return Ok(None);
        };
        let room: ChatRoom = decode(&path, value)?;
        let messages = self.load_messages(room_id).await?;

        let mut state = self.write();
        // 读取期间房间可能被删除
        if state.tombstones.contains(&room_id) {
            return Ok(None);
        }
        let handle = state
            .rooms
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(RoomEntry::new(RoomSnapshot { room, messages }))))
            .clone();
        Ok(Some(handle))
    }

    /// 插入新房间；已存在时返回现有条目
    pub fn insert(&self, snapshot: RoomSnapshot) -> RoomHandle {
        let room_id = snapshot.room.id;
        self.write()
            .rooms
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(RoomEntry::new(snapshot))))
            .clone()
    }

    /// 移出索引并记录墓碑
    pub fn evict(&self, room_id: RoomId) {
        let mut state = self.write();
        state.rooms.remove(&room_id);
        state.tombstones.insert(room_id);
    }

    pub fn handles(&self) -> Vec<RoomHandle> {
        self.read().rooms.values().cloned().collect()
    }

    async fn load_messages(&self, room_id: RoomId) -> Result<Vec<Message>, ApplicationError> {
        let entries = self.store.children(&StorePath::messages(room_id)).await?;
        entries
            .into_iter()
            .map(|entry| decode(&entry.path, entry.value))
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode<T: DeserializeOwned>(path: &StorePath, value: Value) -> Result<T, ApplicationError> {
    serde_json::from_value(value)
        .map_err(|err| ApplicationError::from(StoreError::corrupt(path.as_str(), err.to_string())))
}
