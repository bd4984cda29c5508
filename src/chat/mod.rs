// =============================================================================
// リアルタイムチャットセッションモジュール
// =============================================================================
// EventSub WebSocketへの接続を管理し、受信フレームを型付きの
// チャットアイテムに変換してコンシューマーへ配信する
//
// 機能:
// - セッションハンドシェイク（welcomeフレーム）とサブスクリプション作成
// - keepalive監視（期限切れは警告のみ、再接続はcloseイベント駆動）
// - 指数バックオフによる自動再接続（最大5回）
// - 重複送信回避付きのチャット送信
//
// 使用API: Twitch EventSub WebSocket
// https://dev.twitch.tv/docs/eventsub/handling-websocket-events/
// =============================================================================

mod backoff;
pub mod router;
mod session;
mod subscription;
pub mod types;

pub use backoff::ReconnectBackoff;
pub use router::Frame;
pub use session::{ChatConfig, ChatSession};
pub use subscription::{SubscriptionError, SubscriptionManager};
pub use types::{
    BadgeType, ChannelNotification, ChatBadge, ChatEvent, ChatItem, ChatMessage, ChatSessionState,
};
