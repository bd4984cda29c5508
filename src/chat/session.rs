use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::backoff::ReconnectBackoff;
use super::router::{self, Frame};
use super::subscription::SubscriptionManager;
use super::types::{ChatEvent, ChatItem, ChatSessionState};
use crate::config;
use crate::twitch::{HelixClient, TwitchError};
use crate::util::INVISIBLE_SPACE;

/// keepaliveフレームが途絶えたと判断するまでの時間（秒）
///
/// 超過してもログに警告を残すだけで、再接続のトリガーにはしない。
/// 実際の切断シグナルはトランスポートのcloseイベント
const KEEPALIVE_TIMEOUT_SECS: u64 = 60;

/// イベント配信チャネルの容量
const EVENT_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// セッション設定
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// OAuthアクセストークン
    pub token: String,
    /// 対象チャンネルのログイン名
    pub channel: String,
    /// TwitchアプリのクライアントID
    pub client_id: String,
    /// EventSub WebSocketエンドポイント
    pub ws_url: String,
}

impl ChatConfig {
    pub fn new(token: String, channel: String) -> Self {
        Self {
            token,
            channel,
            client_id: config::TWITCH_CLIENT_ID.to_string(),
            ws_url: config::EVENTSUB_WS_URL.to_string(),
        }
    }
}

/// 受信ループの終了理由（内部用）
enum ReadOutcome {
    /// トランスポートが閉じた（意図的か否かは呼び出し側でフラグ判定）
    Closed,
    /// session_reconnectフレームを受信。URLが提供されていれば直接dialする
    ReconnectTo(Option<String>),
}

/// チャットセッションマネージャー
///
/// EventSub WebSocketへの接続を1本所有し、セッションハンドシェイク、
/// サブスクリプション管理、keepalive監視、再接続を行う。
/// 受信したチャットアイテムは `connect()` が返すチャネル経由で
/// 到着順に配信される
pub struct ChatSession {
    api: Arc<HelixClient>,
    channel: String,
    state: Arc<Mutex<ChatSessionState>>,
    intentionally_closed: Arc<AtomicBool>,
    subscription: Arc<tokio::sync::Mutex<SubscriptionManager>>,
    close_signal: Arc<Notify>,
    /// 重複送信回避用の直前送信テキスト（セッション単位で保持）
    last_sent: tokio::sync::Mutex<String>,
    /// send_message用に解決済みの (broadcaster_id, sender_id)
    resolved_ids: tokio::sync::Mutex<Option<(String, String)>>,
}

impl ChatSession {
    /// 接続を開始し、セッションとイベント受信チャネルを返す
    ///
    /// 接続タスクはバックグラウンドで動き続け、切断時は指数バックオフで
    /// 最大5回まで自動再接続する。上限超過後は`Error{retrying:false}`を
    /// 配信して停止する（再開には新しい`connect`呼び出しが必要）
    pub fn connect(config: ChatConfig) -> (Arc<ChatSession>, mpsc::Receiver<ChatEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let api = Arc::new(HelixClient::new(
            config.token.clone(),
            config.client_id.clone(),
        ));
        let subscription = Arc::new(tokio::sync::Mutex::new(SubscriptionManager::new(
            Arc::clone(&api),
            config.channel.clone(),
        )));

        let session = Arc::new(Self {
            api: Arc::clone(&api),
            channel: config.channel.clone(),
            state: Arc::new(Mutex::new(ChatSessionState::default())),
            intentionally_closed: Arc::new(AtomicBool::new(false)),
            subscription: Arc::clone(&subscription),
            close_signal: Arc::new(Notify::new()),
            last_sent: tokio::sync::Mutex::new(String::new()),
            resolved_ids: tokio::sync::Mutex::new(None),
        });

        let state = Arc::clone(&session.state);
        let intentionally_closed = Arc::clone(&session.intentionally_closed);
        let close_signal = Arc::clone(&session.close_signal);

        tokio::spawn(async move {
            Self::connection_loop(
                config,
                subscription,
                state,
                intentionally_closed,
                close_signal,
                tx,
            )
            .await;
        });

        (session, rx)
    }

    /// 現在の状態スナップショットを取得
    pub fn state(&self) -> ChatSessionState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(e) => {
                log::error!("Failed to acquire session state lock: {}", e);
                ChatSessionState::default()
            }
        }
    }

    /// 現在のセッションIDを取得
    pub fn session_id(&self) -> Option<String> {
        self.state().session_id
    }

    /// セッションを終了する
    ///
    /// 冪等であり、複数回呼んでも安全。所有するサブスクリプションの
    /// 削除をベストエフォートで試行し、接続タスクを停止する
    pub async fn close(&self) {
        if self.intentionally_closed.swap(true, Ordering::SeqCst) {
            return;
        }

        log::info!("Closing chat session for {}", self.channel);

        // 自分が作成したサブスクリプションのみ削除（失敗はログのみ）
        self.subscription.lock().await.delete().await;

        self.close_signal.notify_one();
    }

    /// チャットメッセージを送信
    ///
    /// 直前に送信したテキストと同一の場合は不可視文字を付加して
    /// Twitch側の重複防止を回避する。この状態はセッション単位で保持され、
    /// 他のセッションには漏れない
    pub async fn send_message(&self, text: &str) -> Result<(), TwitchError> {
        let (broadcaster_id, sender_id) = self.resolve_send_ids().await?;

        let mut last_sent = self.last_sent.lock().await;

        let mut outgoing = text.to_string();
        if *last_sent == outgoing {
            outgoing.push(' ');
            outgoing.push(INVISIBLE_SPACE);
        }

        self.api
            .send_chat_message(&broadcaster_id, &sender_id, &outgoing)
            .await?;

        *last_sent = outgoing;
        Ok(())
    }

    /// 送信に必要な認証ユーザー・配信者IDを解決（初回のみAPI呼び出し）
    async fn resolve_send_ids(&self) -> Result<(String, String), TwitchError> {
        let mut resolved = self.resolved_ids.lock().await;
        if let Some(ids) = resolved.as_ref() {
            return Ok(ids.clone());
        }

        let (current_user, broadcaster) = tokio::try_join!(
            self.api.get_user(None),
            self.api.get_user(Some(&self.channel)),
        )?;

        let ids = (broadcaster.id, current_user.id);
        *resolved = Some(ids.clone());
        Ok(ids)
    }

    /// 接続ループ（内部実装）
    ///
    /// 接続→受信ループ→切断判定→バックオフ再接続を繰り返す
    async fn connection_loop(
        config: ChatConfig,
        subscription: Arc<tokio::sync::Mutex<SubscriptionManager>>,
        state: Arc<Mutex<ChatSessionState>>,
        intentionally_closed: Arc<AtomicBool>,
        close_signal: Arc<Notify>,
        tx: mpsc::Sender<ChatEvent>,
    ) {
        let mut backoff = ReconnectBackoff::new();
        let mut url = config.ws_url.clone();

        loop {
            if intentionally_closed.load(Ordering::SeqCst) {
                let _ = tx.send(ChatEvent::Closed {
                    reason: "Session closed".to_string(),
                })
                .await;
                break;
            }

            match connect_async(url.as_str()).await {
                Ok((ws, _)) => {
                    log::info!("WebSocket connected");

                    // 接続成功: バックオフと記録済みエラーをリセット
                    backoff.reset();
                    Self::update_state(&state, |s| {
                        s.connected = true;
                        s.error = None;
                        s.reconnect_attempts = 0;
                    });

                    let outcome =
                        Self::read_loop(ws, &subscription, &state, &close_signal, &tx).await;

                    Self::update_state(&state, |s| {
                        s.connected = false;
                        s.session_id = None;
                    });
                    // サーバー側サブスクリプションはセッションと共に消えるため
                    // 状態のみリセット（意図的終了時はclose()が削除済み）
                    subscription.lock().await.reset();

                    match outcome {
                        ReadOutcome::ReconnectTo(reconnect_url) => {
                            // 提供されたURLへ直接dialする。失敗した場合は
                            // 次のループで通常の再接続パスに戻る
                            url = reconnect_url.unwrap_or_else(|| config.ws_url.clone());
                            log::info!("Server requested reconnect, dialing {}", url);
                            continue;
                        }
                        ReadOutcome::Closed => {
                            if intentionally_closed.load(Ordering::SeqCst) {
                                let _ = tx.send(ChatEvent::Closed {
                                    reason: "Session closed".to_string(),
                                })
                                .await;
                                break;
                            }
                            // 要求していない切断 → バックオフ再接続へ
                        }
                    }
                }
                Err(e) => {
                    log::error!("WebSocket connection failed: {}", e);
                    Self::update_state(&state, |s| {
                        s.error = Some("WebSocket connection error".to_string());
                    });
                }
            }

            // 再接続判定
            if !backoff.should_retry() {
                log::error!("Failed to reconnect after {} attempts", backoff.attempt_count());
                Self::update_state(&state, |s| {
                    s.error = Some("Failed to reconnect after multiple attempts".to_string());
                });
                let _ = tx.send(ChatEvent::Error {
                    message: "Failed to reconnect after multiple attempts".to_string(),
                    retrying: false,
                })
                .await;
                break;
            }

            let delay = backoff.next_delay();
            let attempt = backoff.attempt_count();
            Self::update_state(&state, |s| s.reconnect_attempts = attempt);

            log::info!("Reconnecting in {:?} (attempt {})", delay, attempt);
            let _ = tx.send(ChatEvent::Error {
                message: format!("Connection lost, reconnecting (attempt {})", attempt),
                retrying: true,
            })
            .await;

            // 待機中もclose()で中断可能にする
            tokio::select! {
                _ = sleep(delay) => {}
                _ = close_signal.notified() => {
                    let _ = tx.send(ChatEvent::Closed {
                        reason: "Session closed".to_string(),
                    })
                    .await;
                    break;
                }
            }

            // 汎用再接続は常にデフォルトのエンドポイントへ
            url = config.ws_url.clone();
        }

        log::info!("Connection loop ended");
    }

    /// 1本の接続の受信ループ
    ///
    /// フレームは到着順に処理する。keepalive期限切れは警告ログのみ
    async fn read_loop(
        ws: WsStream,
        subscription: &Arc<tokio::sync::Mutex<SubscriptionManager>>,
        state: &Arc<Mutex<ChatSessionState>>,
        close_signal: &Arc<Notify>,
        tx: &mpsc::Sender<ChatEvent>,
    ) -> ReadOutcome {
        let (mut write, mut read) = ws.split();
        let mut keepalive_deadline =
            Instant::now() + Duration::from_secs(KEEPALIVE_TIMEOUT_SECS);

        loop {
            tokio::select! {
                _ = close_signal.notified() => {
                    let _ = write.send(Message::Close(None)).await;
                    return ReadOutcome::Closed;
                }
                _ = sleep_until(keepalive_deadline) => {
                    // 期限切れは再接続トリガーではない。切断の実シグナルは
                    // closeイベントなので、ここでは警告のみ
                    log::warn!("Keepalive timeout - connection may be stale");
                    keepalive_deadline =
                        Instant::now() + Duration::from_secs(KEEPALIVE_TIMEOUT_SECS);
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(outcome) = Self::handle_frame(
                                &text,
                                subscription,
                                state,
                                &mut keepalive_deadline,
                                tx,
                            )
                            .await
                            {
                                return outcome;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log::info!("WebSocket closed by server: {:?}", frame);
                            return ReadOutcome::Closed;
                        }
                        Some(Ok(_)) => {
                            // ping/pong/binaryは無視
                        }
                        Some(Err(e)) => {
                            // トランスポートエラーは観測可能な状態に記録するのみ。
                            // 再接続はcloseイベントで判断する
                            log::error!("WebSocket error: {}", e);
                            Self::update_state(state, |s| {
                                s.error = Some("WebSocket connection error".to_string());
                            });
                        }
                        None => {
                            log::info!("WebSocket stream ended");
                            return ReadOutcome::Closed;
                        }
                    }
                }
            }
        }
    }

    /// 1フレームを処理。受信ループを抜ける場合はSomeを返す
    async fn handle_frame(
        text: &str,
        subscription: &Arc<tokio::sync::Mutex<SubscriptionManager>>,
        state: &Arc<Mutex<ChatSessionState>>,
        keepalive_deadline: &mut Instant,
        tx: &mpsc::Sender<ChatEvent>,
    ) -> Option<ReadOutcome> {
        match Frame::parse(text) {
            Some(Frame::Welcome { session_id }) => {
                log::info!("Received session ID: {}", session_id);
                Self::update_state(state, |s| {
                    s.session_id = Some(session_id.clone());
                });

                if tx
                    .send(ChatEvent::Connected {
                        session_id: session_id.clone(),
                    })
                    .await
                    .is_err()
                {
                    return Some(ReadOutcome::Closed);
                }

                // セッション確立と同時にサブスクリプションを作成（セッション毎に1回）
                let mut sub = subscription.lock().await;
                if let Err(e) = sub.create(Some(&session_id)).await {
                    log::error!("Error creating chat subscription: {}", e);
                    Self::update_state(state, |s| {
                        s.error = Some(e.to_string());
                    });
                    let _ = tx.send(ChatEvent::Error {
                        message: e.to_string(),
                        retrying: false,
                    })
                    .await;
                }
                None
            }
            Some(Frame::Keepalive) => {
                *keepalive_deadline =
                    Instant::now() + Duration::from_secs(KEEPALIVE_TIMEOUT_SECS);
                None
            }
            Some(Frame::Notification {
                subscription_type,
                event,
                timestamp,
            }) => {
                let item = if subscription_type == "channel.chat.message" {
                    router::chat_message_from_event(&event, timestamp).map(ChatItem::Message)
                } else {
                    Some(ChatItem::Notification(router::notification_from_event(
                        &subscription_type,
                        &event,
                        timestamp,
                    )))
                };

                if let Some(item) = item {
                    if tx.send(ChatEvent::Item { item }).await.is_err() {
                        // コンシューマーが離脱した場合は受信を停止
                        return Some(ReadOutcome::Closed);
                    }
                }
                None
            }
            Some(Frame::Reconnect { reconnect_url }) => {
                log::info!("Received session_reconnect frame");
                Some(ReadOutcome::ReconnectTo(reconnect_url))
            }
            Some(Frame::Revocation {
                subscription_type,
                status,
            }) => {
                // ログのみ。状態は変更しない
                log::warn!(
                    "Subscription revoked: {} (status: {})",
                    subscription_type,
                    status
                );
                None
            }
            Some(Frame::Unknown { message_type }) => {
                log::info!("Unknown message type: {}", message_type);
                None
            }
            None => {
                // 不正なフレームはFrame::parseがログ済み
                None
            }
        }
    }

    fn update_state<F: FnOnce(&mut ChatSessionState)>(
        state: &Arc<Mutex<ChatSessionState>>,
        f: F,
    ) {
        match state.lock() {
            Ok(mut s) => f(&mut s),
            Err(e) => log::error!("Failed to acquire session state lock: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_with_server(server: &mockito::ServerGuard) -> ChatSession {
        let api = Arc::new(HelixClient::with_base_url(
            "test-token-1234567890".to_string(),
            "test-client-id".to_string(),
            server.url(),
        ));
        ChatSession {
            api: Arc::clone(&api),
            channel: "somechannel".to_string(),
            state: Arc::new(Mutex::new(ChatSessionState::default())),
            intentionally_closed: Arc::new(AtomicBool::new(false)),
            subscription: Arc::new(tokio::sync::Mutex::new(SubscriptionManager::new(
                api,
                "somechannel".to_string(),
            ))),
            close_signal: Arc::new(Notify::new()),
            last_sent: tokio::sync::Mutex::new(String::new()),
            resolved_ids: tokio::sync::Mutex::new(None),
        }
    }

    async fn mock_users(server: &mut mockito::ServerGuard) {
        server
            .mock("GET", "/users")
            .with_status(200)
            .with_body(r#"{"data":[{"id":"456","login":"me","display_name":"Me"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/users?login=somechannel")
            .with_status(200)
            .with_body(
                r#"{"data":[{"id":"123","login":"somechannel","display_name":"SomeChannel"}]}"#,
            )
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_duplicate_send_carries_invisible_marker() {
        let mut server = mockito::Server::new_async().await;
        mock_users(&mut server).await;

        let sent_body = r#"{"data":[{"message_id":"m1","is_sent":true}]}"#;

        // 1通目はそのまま送られる
        let plain = server
            .mock("POST", "/chat/messages")
            .match_body(mockito::Matcher::Json(json!({
                "broadcaster_id": "123",
                "sender_id": "456",
                "message": "hi"
            })))
            .with_status(200)
            .with_body(sent_body)
            .expect(1)
            .create_async()
            .await;

        // 同一テキストの2通目のみ不可視文字付き
        let marked = server
            .mock("POST", "/chat/messages")
            .match_body(mockito::Matcher::Json(json!({
                "broadcaster_id": "123",
                "sender_id": "456",
                "message": format!("hi {}", INVISIBLE_SPACE)
            })))
            .with_status(200)
            .with_body(sent_body)
            .expect(1)
            .create_async()
            .await;

        let session = session_with_server(&server);
        session.send_message("hi").await.unwrap();
        session.send_message("hi").await.unwrap();

        plain.assert_async().await;
        marked.assert_async().await;
    }

    #[tokio::test]
    async fn test_distinct_sends_are_unmarked() {
        let mut server = mockito::Server::new_async().await;
        mock_users(&mut server).await;

        let sent_body = r#"{"data":[{"message_id":"m1","is_sent":true}]}"#;
        let first = server
            .mock("POST", "/chat/messages")
            .match_body(mockito::Matcher::PartialJson(json!({"message": "hello"})))
            .with_status(200)
            .with_body(sent_body)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/chat/messages")
            .match_body(mockito::Matcher::PartialJson(json!({"message": "world"})))
            .with_status(200)
            .with_body(sent_body)
            .expect(1)
            .create_async()
            .await;

        let session = session_with_server(&server);
        session.send_message("hello").await.unwrap();
        session.send_message("world").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
    }

    #[test]
    fn test_chat_config_defaults() {
        let config = ChatConfig::new("token".to_string(), "somechannel".to_string());
        assert_eq!(config.client_id, config::TWITCH_CLIENT_ID);
        assert!(config.ws_url.starts_with("wss://eventsub.wss.twitch.tv/ws"));
    }

    #[test]
    fn test_initial_state() {
        let state = ChatSessionState::default();
        assert!(!state.connected);
        assert!(state.session_id.is_none());
        assert!(state.error.is_none());
        assert_eq!(state.reconnect_attempts, 0);
    }
}
