use application::{outbound_channel, ApplicationError, ChatService, CreateRoomRequest, SessionId};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::UserId;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::events::ClientEvent;
use crate::state::AppState;

/// WebSocket 连接管理器
///
/// 一个连接对应聊天服务中的一个会话：
/// - 发送任务把会话出站通道中的事件写回客户端
/// - 接收任务解析客户端事件并交给聊天服务
/// - 任一任务结束即断开会话；出站队列溢出时会话被移除，发送任务随之结束
pub struct WebSocketConnection {
    state: AppState,
    user_id: UserId,
}

impl WebSocketConnection {
    pub fn new(state: AppState, user_id: UserId) -> Self {
        Self { state, user_id }
    }

    pub async fn run(self, socket: WebSocket) {
        let (outbound_tx, mut outbound_rx) = outbound_channel();
        let session_id = self.state.chat.connect(self.user_id, outbound_tx);
        info!(user_id = %self.user_id, session_id = %session_id, "WebSocket 连接已建立");

        let (mut sender, mut incoming) = socket.split();

        // 创建 mpsc channel 来解耦对 sender 的访问
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：统一处理所有对 WebSocket sender 的写操作
        let mut send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(cmd) = cmd_rx.recv() => {
                        match cmd {
                            WsCommand::SendPong(data) => {
                                if sender.send(WsMessage::Pong(data.into())).await.is_err() {
                                    warn!("Failed to send pong message");
                                    break;
                                }
                            }
                        }
                    }
                    event = outbound_rx.recv() => {
                        let Some(event) = event else {
                            debug!("会话出站通道已关闭");
                            break;
                        };
                        let payload = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(err) => {
                                error!(error = %err, "failed to serialize websocket payload");
                                continue;
                            }
                        };
                        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                            warn!("Failed to send text message");
                            break;
                        }
                    }
                }
            }
            debug!("WebSocket发送任务结束");
        });

        // 接收任务：处理来自WebSocket客户端的消息
        let chat = self.state.chat.clone();
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(message)) = incoming.next().await {
                if Self::handle_incoming(&chat, session_id, message, &cmd_tx)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            debug!("WebSocket接收任务结束");
        });

        // 等待任意一个任务完成（连接断开）；进行中的房间操作不会被 abort 打断
        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        self.state.chat.disconnect(session_id);
        info!(user_id = %self.user_id, session_id = %session_id, "WebSocket连接已断开");
    }

    async fn handle_incoming(
        chat: &ChatService,
        session_id: SessionId,
        message: WsMessage,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Result<(), ()> {
        match message {
            WsMessage::Close(_) => {
                debug!(session_id = %session_id, "WebSocket收到关闭消息");
                return Err(());
            }
            WsMessage::Ping(data) => {
                if cmd_tx
                    .send(WsCommand::SendPong(data.to_vec()))
                    .await
                    .is_err()
                {
                    warn!("Failed to send pong command");
                    return Err(());
                }
            }
            WsMessage::Pong(_) => {}
            WsMessage::Text(text) => dispatch(chat, session_id, text.as_str()).await,
            WsMessage::Binary(_) => {
                warn!(session_id = %session_id, "收到二进制帧");
                chat.send_error(
                    session_id,
                    "VALIDATION_ERROR",
                    "binary frames are not supported",
                );
            }
        }
        Ok(())
    }
}

/// 解析一帧客户端事件并执行；失败时只回复发起请求的会话，连接保持打开
async fn dispatch(chat: &ChatService, session_id: SessionId, text: &str) {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(err) => {
            warn!(session_id = %session_id, error = %err, "无法解析客户端事件");
            chat.send_error(
                session_id,
                "VALIDATION_ERROR",
                format!("malformed event: {err}"),
            );
            return;
        }
    };

    let kind = event.name();
    let result: Result<(), ApplicationError> = match event {
        ClientEvent::JoinRoom { room_id } => chat.join_room(session_id, room_id).await,
        ClientEvent::CreateRoom {
            name,
            description,
            expiry,
        } => chat
            .create_room(
                session_id,
                CreateRoomRequest {
                    name,
                    description,
                    expiry_hours: expiry,
                },
            )
            .await
            .map(|_| ()),
        ClientEvent::RemoveRoom { room_id } => chat.remove_room(session_id, room_id).await,
        ClientEvent::SendMessage { room_id, message } => chat
            .send_message(session_id, room_id, message)
            .await
            .map(|_| ()),
        ClientEvent::GetMessages { room_id } => chat.send_history(session_id, room_id).await,
        ClientEvent::GetChatRooms {} => {
            chat.send_room_list(session_id).await;
            Ok(())
        }
    };

    if let Err(err) = result {
        if err.is_server_fault() {
            error!(session_id = %session_id, event = kind, error = %err, "处理客户端事件失败");
            chat.send_error(session_id, err.code(), "internal server error");
        } else {
            warn!(session_id = %session_id, event = kind, error = %err, "拒绝客户端事件");
            chat.send_error(session_id, err.code(), err.to_string());
        }
    }
}

/// WebSocket 写操作命令
#[derive(Debug)]
enum WsCommand {
    SendPong(Vec<u8>),
}
