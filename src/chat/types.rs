use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 表示対象のバッジ種別（許可リスト）
///
/// ここに含まれないバッジはフレーム処理時に黙って破棄される
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeType {
    Broadcaster,
    Moderator,
    Vip,
    Subscriber,
    Premium,
    Staff,
    GlobalMod,
    Admin,
}

impl BadgeType {
    /// Twitchのバッジset_idから変換。許可リスト外はNone
    pub fn from_set_id(set_id: &str) -> Option<Self> {
        match set_id {
            "broadcaster" => Some(Self::Broadcaster),
            "moderator" => Some(Self::Moderator),
            "vip" => Some(Self::Vip),
            "subscriber" => Some(Self::Subscriber),
            "premium" => Some(Self::Premium),
            "staff" => Some(Self::Staff),
            "global_mod" => Some(Self::GlobalMod),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatBadge {
    #[serde(rename = "type")]
    pub badge_type: BadgeType,
    /// サブスク月数などの付加情報
    pub info: Option<String>,
}

/// チャットメッセージ
///
/// フレームから構築された後は変更されない
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub color: Option<String>,
    pub badges: Vec<ChatBadge>,
}

/// チャット以外のチャンネルイベントから合成される通知
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelNotification {
    pub id: String,
    pub event_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// コンシューマーに配信されるチャットアイテム
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChatItem {
    #[serde(rename = "message")]
    Message(ChatMessage),
    #[serde(rename = "notification")]
    Notification(ChannelNotification),
}

/// セッションの観測可能な状態スナップショット
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionState {
    pub connected: bool,
    pub session_id: Option<String>,
    pub error: Option<String>,
    pub reconnect_attempts: u32,
}

/// セッションイベント
///
/// connect()が返す受信チャネル経由で、到着順に単一コンシューマーへ配信される
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ChatEvent {
    /// セッション確立（welcomeフレーム受信後）
    #[serde(rename = "connected")]
    Connected { session_id: String },

    /// チャットメッセージまたはチャンネル通知を受信
    #[serde(rename = "item")]
    Item { item: ChatItem },

    /// エラー発生（retrying=trueなら自動再接続する）
    #[serde(rename = "error")]
    Error { message: String, retrying: bool },

    /// セッション終了
    #[serde(rename = "closed")]
    Closed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_allow_list() {
        assert_eq!(BadgeType::from_set_id("broadcaster"), Some(BadgeType::Broadcaster));
        assert_eq!(BadgeType::from_set_id("global_mod"), Some(BadgeType::GlobalMod));
        assert_eq!(BadgeType::from_set_id("premium"), Some(BadgeType::Premium));

        // 許可リスト外は破棄される
        assert_eq!(BadgeType::from_set_id("bits"), None);
        assert_eq!(BadgeType::from_set_id(""), None);
    }

    #[test]
    fn test_chat_event_serialization() {
        let event = ChatEvent::Connected {
            session_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["sessionId"], "abc");
    }
}
