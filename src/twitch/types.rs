use serde::{Deserialize, Serialize};

// Helix API レスポンス型

#[derive(Debug, Clone, Deserialize)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UsersResponse {
    pub data: Vec<TwitchUser>,
}

// EventSubサブスクリプション関連

/// チャットメッセージ購読のイベントタイプ
pub const CHAT_MESSAGE_SUBSCRIPTION_TYPE: &str = "channel.chat.message";

#[derive(Debug, Serialize)]
pub struct CreateSubscriptionRequest {
    #[serde(rename = "type")]
    pub subscription_type: String,
    pub version: String,
    pub condition: SubscriptionCondition,
    pub transport: SubscriptionTransport,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionCondition {
    pub broadcaster_user_id: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionTransport {
    /// 常に "websocket"
    pub method: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionData {
    pub id: String,
    #[serde(rename = "type", default)]
    pub subscription_type: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionsResponse {
    pub data: Vec<SubscriptionData>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub cursor: Option<String>,
}

// チャット送信

#[derive(Debug, Serialize)]
pub struct SendMessageRequest {
    pub broadcaster_id: String,
    pub sender_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    pub data: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub is_sent: bool,
    pub drop_reason: Option<DropReason>,
}

#[derive(Debug, Deserialize)]
pub struct DropReason {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

// エモートAPI レスポンス型

#[derive(Debug, Deserialize)]
pub struct EmotesResponse {
    pub data: Vec<HelixEmote>,
    /// URL構築用テンプレート（{{id}}/{{format}}/{{theme_mode}}/{{scale}}を置換）
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct HelixEmote {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub format: Vec<String>,
    #[serde(default)]
    pub theme_mode: Vec<String>,
    #[serde(default)]
    pub scale: Vec<String>,
}
