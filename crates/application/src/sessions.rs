//! 实时连接的会话登记与事件扇出。
//!
//! 每个 WebSocket 连接对应一个会话：用户身份、出站通道、已加入的房间集合。
//! 这里的临界区都是同步的，调用方可以在持有房间锁的同时调用。
//! 出站通道有界，队列写满的会话会被直接移除，连接随之关闭。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock};

use domain::{Message, RoomId, RoomSnapshot, UserId};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

/// 服务端推送给客户端的事件，线上格式为 `{"event": name, "data": payload}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    PreviousMessages {
        room_id: RoomId,
        messages: Vec<Message>,
    },
    #[serde(rename_all = "camelCase")]
    UserJoined { room_id: RoomId, user_id: UserId },
    #[serde(rename_all = "camelCase")]
    RoomJoined { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_id: RoomId, room: RoomSnapshot },
    #[serde(rename_all = "camelCase")]
    RoomRemoved { room_id: RoomId },
    NewMessage { message: Message },
    ChatRoomsList { rooms: Vec<RoomSnapshot> },
    Error { code: String, message: String },
}

pub type EventSender = mpsc::Sender<ServerEvent>;
pub type EventReceiver = mpsc::Receiver<ServerEvent>;

/// 每个会话最多积压的出站事件数
pub const OUTBOUND_CAPACITY: usize = 1000;

pub fn outbound_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Session {
    user_id: UserId,
    outbound: EventSender,
    rooms: HashSet<RoomId>,
}

impl Session {
    /// 队列已满时返回 `false`
    fn deliver(&self, id: SessionId, event: ServerEvent) -> bool {
        match self.outbound.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            // 接收端已关闭说明连接正在断开，事件直接丢弃
            Err(TrySendError::Closed(_)) => {
                debug!(session_id = %id, "会话出站通道已关闭");
                true
            }
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: UserId, outbound: EventSender) -> SessionId {
        let id = SessionId::generate();
        let session = Session {
            user_id,
            outbound,
            rooms: HashSet::new(),
        };
        self.write().insert(id, session);
        id
    }

    /// 移除会话，返回它曾加入的房间
    pub fn unregister(&self, id: SessionId) -> Option<HashSet<RoomId>> {
        self.write().remove(&id).map(|session| session.rooms)
    }

    pub fn user_of(&self, id: SessionId) -> Option<UserId> {
        self.read().get(&id).map(|session| session.user_id)
    }

    /// 会话已不存在时返回 `false`
    pub fn join(&self, id: SessionId, room_id: RoomId) -> bool {
        match self.write().get_mut(&id) {
            Some(session) => {
                session.rooms.insert(room_id);
                true
            }
            None => false,
        }
    }

    pub fn joined_rooms(&self, id: SessionId) -> HashSet<RoomId> {
        self.read()
            .get(&id)
            .map(|session| session.rooms.clone())
            .unwrap_or_default()
    }

    /// 从所有会话的已加入集合中移除该房间
    pub fn forget_room(&self, room_id: RoomId) {
        for session in self.write().values_mut() {
            session.rooms.remove(&room_id);
        }
    }

    pub fn send_to(&self, id: SessionId, event: ServerEvent) {
        let overflowed = match self.read().get(&id) {
            Some(session) => !session.deliver(id, event),
            None => false,
        };
        if overflowed {
            self.drop_lagging(vec![id]);
        }
    }

    /// 发送给加入了该房间的会话，可以排除一个会话
    pub fn broadcast_room(&self, room_id: RoomId, event: ServerEvent, except: Option<SessionId>) {
        let lagging: Vec<SessionId> = self
            .read()
            .iter()
            .filter(|(id, session)| Some(**id) != except && session.rooms.contains(&room_id))
            .filter(|(id, session)| !session.deliver(**id, event.clone()))
            .map(|(id, _)| *id)
            .collect();
        self.drop_lagging(lagging);
    }

    pub fn broadcast_all(&self, event: ServerEvent) {
        let lagging: Vec<SessionId> = self
            .read()
            .iter()
            .filter(|(id, session)| !session.deliver(**id, event.clone()))
            .map(|(id, _)| *id)
            .collect();
        self.drop_lagging(lagging);
    }

    /// 移除出站队列溢出的会话，丢弃发送端后连接的写任务会结束
    fn drop_lagging(&self, lagging: Vec<SessionId>) {
        if lagging.is_empty() {
            return;
        }
        let mut sessions = self.write();
        for id in lagging {
            if sessions.remove(&id).is_some() {
                warn!(session_id = %id, capacity = OUTBOUND_CAPACITY, "出站队列已满，断开会话");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
