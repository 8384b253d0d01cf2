use std::future::Future;
use std::sync::Arc;

use domain::{ChatRoom, Message, MessageBody, MessageId, RoomId, RoomSnapshot, StorePath, UserId};
use tracing::{error, info, warn};

use crate::{
    clock::Clock,
    directory::{RoomDirectory, RoomHandle},
    error::ApplicationError,
    sessions::{EventSender, ServerEvent, SessionId, SessionRegistry},
    store::CredentialStore,
};

#[derive(Debug, Clone, Default)]
pub struct CreateRoomRequest {
    pub name: String,
    pub description: Option<String>,
    /// 存活时长（小时）
    pub expiry_hours: Option<i64>,
}

pub struct ChatServiceDependencies {
    pub store: Arc<dyn CredentialStore>,
    pub clock: Arc<dyn Clock>,
}

/// 聊天编排：把房间索引、会话登记与持久化存储串起来。
///
/// 同一房间上的加入、发送、删除通过房间锁串行执行。
/// 会修改房间的操作在独立任务中运行，调用方的 future 被丢弃时
/// 操作仍会完成存储写入与内存更新。
pub struct ChatService {
    core: Arc<ChatCore>,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        let directory = RoomDirectory::new(deps.store.clone());
        Self {
            core: Arc::new(ChatCore {
                deps,
                directory,
                sessions: SessionRegistry::new(),
            }),
        }
    }

    /// 启动时预热房间索引
    pub async fn hydrate(&self) -> Result<usize, ApplicationError> {
        self.core.directory.hydrate().await
    }

    pub fn connect(&self, user_id: UserId, outbound: EventSender) -> SessionId {
        let session_id = self.core.sessions.register(user_id, outbound);
        info!(session_id = %session_id, user_id = %user_id, "会话已连接");
        session_id
    }

    pub fn disconnect(&self, session_id: SessionId) {
        if let Some(rooms) = self.core.sessions.unregister(session_id) {
            info!(session_id = %session_id, rooms = rooms.len(), "会话已断开");
        }
    }

    pub fn session_count(&self) -> usize {
        self.core.sessions.len()
    }

    pub async fn join_room(
        &self,
        session_id: SessionId,
        room_id: RoomId,
    ) -> Result<(), ApplicationError> {
        self.detached(move |core| async move { core.join_room(session_id, room_id).await })
            .await
    }

    pub async fn create_room(
        &self,
        session_id: SessionId,
        request: CreateRoomRequest,
    ) -> Result<RoomSnapshot, ApplicationError> {
        self.detached(move |core| async move { core.create_room(session_id, request).await })
            .await
    }

    pub async fn send_message(
        &self,
        session_id: SessionId,
        room_id: RoomId,
        body: impl Into<String>,
    ) -> Result<Message, ApplicationError> {
        let body = body.into();
        self.detached(move |core| async move {
            core.send_message(session_id, room_id, body).await
        })
        .await
    }

    /// 任何已认证会话都可以删除房间
    pub async fn remove_room(
        &self,
        session_id: SessionId,
        room_id: RoomId,
    ) -> Result<(), ApplicationError> {
        self.detached(move |core| async move { core.remove_room(session_id, room_id).await })
            .await
    }

    pub async fn list_rooms(&self) -> Vec<RoomSnapshot> {
        self.core.list_rooms().await
    }

    pub async fn get_messages(&self, room_id: RoomId) -> Result<Vec<Message>, ApplicationError> {
        self.core.get_messages(room_id).await
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<ChatRoom, ApplicationError> {
        self.core.get_room(room_id).await
    }

    /// 只回复给请求的会话
    pub async fn send_room_list(&self, session_id: SessionId) {
        let rooms = self.core.list_rooms().await;
        self.core
            .sessions
            .send_to(session_id, ServerEvent::ChatRoomsList { rooms });
    }

    /// 只回复给请求的会话
    pub async fn send_history(
        &self,
        session_id: SessionId,
        room_id: RoomId,
    ) -> Result<(), ApplicationError> {
        let messages = self.core.get_messages(room_id).await?;
        self.core.sessions.send_to(
            session_id,
            ServerEvent::PreviousMessages { room_id, messages },
        );
        Ok(())
    }

    pub fn send_error(&self, session_id: SessionId, code: &str, message: impl Into<String>) {
        self.core.sessions.send_to(
            session_id,
            ServerEvent::Error {
                code: code.to_owned(),
                message: message.into(),
            },
        );
    }

    /// 删除所有已过期的房间，返回删除数量
    pub async fn purge_expired(&self) -> Result<usize, ApplicationError> {
        self.detached(|core| async move { core.purge_expired().await })
            .await
    }

    async fn detached<T, F, Fut>(&self, op: F) -> Result<T, ApplicationError>
    where
        F: FnOnce(Arc<ChatCore>) -> Fut,
        Fut: Future<Output = Result<T, ApplicationError>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(op(self.core.clone()))
            .await
            .map_err(|err| {
                error!(error = %err, "聊天任务异常结束");
                ApplicationError::internal(err.to_string())
            })?
    }
}

struct ChatCore {
    deps: ChatServiceDependencies,
    directory: RoomDirectory,
    sessions: SessionRegistry,
}

impl ChatCore {
    async fn join_room(
        &self,
        session_id: SessionId,
        room_id: RoomId,
    ) -> Result<(), ApplicationError> {
        let Some(user_id) = self.sessions.user_of(session_id) else {
            return Ok(());
        };
        if self.directory.is_tombstoned(room_id) {
            return Err(ApplicationError::RoomNotFound(room_id));
        }

        match self.directory.load(room_id).await? {
            Some(handle) => {
                let entry = handle.lock().await;
                if entry.is_removed() {
                    return Err(ApplicationError::RoomNotFound(room_id));
                }
                if !self.sessions.join(session_id, room_id) {
                    return Ok(());
                }
                self.sessions
                    .send_to(session_id, ServerEvent::RoomJoined { room_id });
                self.sessions.send_to(
                    session_id,
                    ServerEvent::PreviousMessages {
                        room_id,
                        messages: entry.snapshot.messages.clone(),
                    },
                );
                self.sessions.broadcast_room(
                    room_id,
                    ServerEvent::UserJoined { room_id, user_id },
                    Some(session_id),
                );
            }
            None => {
                if self.directory.is_tombstoned(room_id) {
                    return Err(ApplicationError::RoomNotFound(room_id));
                }
                if !self.sessions.join(session_id, room_id) {
                    return Ok(());
                }
                self.sessions
                    .send_to(session_id, ServerEvent::RoomJoined { room_id });
                self.sessions.broadcast_room(
                    room_id,
                    ServerEvent::UserJoined { room_id, user_id },
                    Some(session_id),
                );
            }
        }

        info!(session_id = %session_id, room_id = %room_id, "加入房间");
        Ok(())
    }

    async fn create_room(
        &self,
        session_id: SessionId,
        request: CreateRoomRequest,
    ) -> Result<RoomSnapshot, ApplicationError> {
        let creator = self
            .sessions
            .user_of(session_id)
            .ok_or(ApplicationError::Unauthenticated)?;

        let rooms = StorePath::rooms();
        let room_id = RoomId::from(self.deps.store.append(&rooms).await?);
        let room = ChatRoom::new(
            room_id,
            request.name,
            request.description,
            creator,
            self.deps.clock.now(),
            request.expiry_hours,
        )?;
        let record = serde_json::to_value(&room)
            .map_err(|err| ApplicationError::internal(err.to_string()))?;
        self.deps
            .store
            .create(&StorePath::room(room_id), record)
            .await?;

        let snapshot = RoomSnapshot {
            room,
            messages: Vec::new(),
        };
        self.directory.insert(snapshot.clone());
        self.sessions.broadcast_all(ServerEvent::RoomCreated {
            room_id,
            room: snapshot.clone(),
        });

        info!(room_id = %room_id, created_by = %creator, "房间已创建");
        Ok(snapshot)
    }

    async fn send_message(
        &self,
        session_id: SessionId,
        room_id: RoomId,
        body: String,
    ) -> Result<Message, ApplicationError> {
        let body = MessageBody::new(body)?;
        let sender_id = self
            .sessions
            .user_of(session_id)
            .ok_or(ApplicationError::Unauthenticated)?;
        let handle = self.active_room(room_id).await?;

        let mut entry = handle.lock().await;
        if entry.is_removed() {
            return Err(ApplicationError::RoomNotFound(room_id));
        }
        if !self.deps.store.exists(&StorePath::room(room_id)).await? {
            return Err(ApplicationError::RoomNotFound(room_id));
        }

        let messages = StorePath::messages(room_id);
        let message_id = MessageId::from(self.deps.store.append(&messages).await?);
        let now = self.deps.clock.now();
        let timestamp = match entry.snapshot.messages.last() {
            Some(previous) if previous.timestamp > now => previous.timestamp,
            _ => now,
        };
        let message = Message::new(message_id, room_id, sender_id, body, timestamp);
        let record = serde_json::to_value(&message)
            .map_err(|err| ApplicationError::internal(err.to_string()))?;
        self.deps
            .store
            .write(&StorePath::message(room_id, message_id), record)
            .await?;

        entry.snapshot.messages.push(message.clone());
        self.sessions.broadcast_room(
            room_id,
            ServerEvent::NewMessage {
                message: message.clone(),
            },
            None,
        );
        Ok(message)
    }

    async fn remove_room(
        &self,
        session_id: SessionId,
        room_id: RoomId,
    ) -> Result<(), ApplicationError> {
        let user_id = self
            .sessions
            .user_of(session_id)
            .ok_or(ApplicationError::Unauthenticated)?;
        self.delete_room(room_id).await?;
        info!(room_id = %room_id, removed_by = %user_id, "房间已删除");
        Ok(())
    }

    async fn list_rooms(&self) -> Vec<RoomSnapshot> {
        let mut rooms = Vec::new();
        for handle in self.directory.handles() {
            let entry = handle.lock().await;
            if !entry.is_removed() {
                rooms.push(entry.snapshot.clone());
            }
        }
        rooms.sort_by(|a, b| {
            a.room
                .created_at
                .cmp(&b.room.created_at)
                .then(a.room.id.cmp(&b.room.id))
        });
        rooms
    }

    async fn get_messages(&self, room_id: RoomId) -> Result<Vec<Message>, ApplicationError> {
        match self.active_room(room_id).await {
            Ok(handle) => {
                let entry = handle.lock().await;
                if entry.is_removed() {
                    return Ok(Vec::new());
                }
                Ok(entry.snapshot.messages.clone())
            }
            Err(ApplicationError::RoomNotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    async fn get_room(&self, room_id: RoomId) -> Result<ChatRoom, ApplicationError> {
        let handle = self.active_room(room_id).await?;
        let entry = handle.lock().await;
        if entry.is_removed() {
            return Err(ApplicationError::RoomNotFound(room_id));
        }
        Ok(entry.snapshot.room.clone())
    }

    async fn purge_expired(&self) -> Result<usize, ApplicationError> {
        let now = self.deps.clock.now();
        let mut expired = Vec::new();
        for handle in self.directory.handles() {
            let entry = handle.lock().await;
            if !entry.is_removed() && entry.snapshot.room.is_expired(now) {
                expired.push(entry.snapshot.room.id);
            }
        }

        let mut removed = 0;
        for room_id in expired {
            match self.delete_room(room_id).await {
                Ok(()) => {
                    info!(room_id = %room_id, "过期房间已删除");
                    removed += 1;
                }
                // 并发删除
                Err(ApplicationError::RoomNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(removed)
    }

    async fn active_room(&self, room_id: RoomId) -> Result<RoomHandle, ApplicationError> {
        if self.directory.is_tombstoned(room_id) {
            return Err(ApplicationError::RoomNotFound(room_id));
        }
        self.directory
            .load(room_id)
            .await?
            .ok_or(ApplicationError::RoomNotFound(room_id))
    }

    async fn delete_room(&self, room_id: RoomId) -> Result<(), ApplicationError> {
        let handle = self.active_room(room_id).await?;
        let mut entry = handle.lock().await;
        if entry.is_removed() {
            return Err(ApplicationError::RoomNotFound(room_id));
        }

        if let Err(err) = self.deps.store.remove(&StorePath::room(room_id)).await {
            warn!(room_id = %room_id, error = %err, "删除房间记录失败");
            return Err(err.into());
        }

        entry.mark_removed();
        self.directory.evict(room_id);
        self.sessions.forget_room(room_id);
        self.sessions
            .broadcast_all(ServerEvent::RoomRemoved { room_id });
        Ok(())
    }
}
