//! EventSubフレームの分類とチャンネル通知の整形
//!
//! 受信したJSONフレームを `metadata.message_type` で分類し、
//! notificationフレームからチャットメッセージ／チャンネル通知を抽出する。
//! 不正なフレームはログに残して破棄し、決して致命的エラーにしない。

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::types::{BadgeType, ChannelNotification, ChatBadge, ChatMessage};

/// 分類済みフレーム
///
/// `metadata.message_type` をタグとするユニオン型。
/// 各バリアントは自分のペイロードのみを保持する
#[derive(Debug, Clone)]
pub enum Frame {
    Welcome {
        session_id: String,
    },
    Keepalive,
    Notification {
        subscription_type: String,
        event: Value,
        timestamp: Option<DateTime<Utc>>,
    },
    Reconnect {
        reconnect_url: Option<String>,
    },
    Revocation {
        subscription_type: String,
        status: String,
    },
    Unknown {
        message_type: String,
    },
}

impl Frame {
    /// 生のテキストフレームを分類する
    ///
    /// JSONとして不正、または必須フィールド欠落の場合はNone（ログのみ）
    pub fn parse(text: &str) -> Option<Frame> {
        let data: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Failed to parse frame as JSON: {}", e);
                return None;
            }
        };

        let message_type = data
            .pointer("/metadata/message_type")
            .and_then(Value::as_str)
            .unwrap_or("");

        match message_type {
            "session_welcome" => {
                let session_id = match data
                    .pointer("/payload/session/id")
                    .and_then(Value::as_str)
                {
                    Some(id) => id.to_string(),
                    None => {
                        log::warn!("session_welcome frame is missing payload.session.id");
                        return None;
                    }
                };
                Some(Frame::Welcome { session_id })
            }
            "session_keepalive" => Some(Frame::Keepalive),
            "notification" => {
                let subscription_type = match data
                    .pointer("/payload/subscription/type")
                    .and_then(Value::as_str)
                {
                    Some(t) => t.to_string(),
                    None => {
                        log::warn!("notification frame is missing payload.subscription.type");
                        return None;
                    }
                };
                let event = data.pointer("/payload/event").cloned().unwrap_or(Value::Null);
                let timestamp = data
                    .pointer("/metadata/message_timestamp")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                Some(Frame::Notification {
                    subscription_type,
                    event,
                    timestamp,
                })
            }
            "session_reconnect" => {
                let reconnect_url = data
                    .pointer("/payload/session/reconnect_url")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some(Frame::Reconnect { reconnect_url })
            }
            "revocation" => {
                let subscription_type = data
                    .pointer("/payload/subscription/type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let status = data
                    .pointer("/payload/subscription/status")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                Some(Frame::Revocation {
                    subscription_type,
                    status,
                })
            }
            other => Some(Frame::Unknown {
                message_type: other.to_string(),
            }),
        }
    }
}

/// channel.chat.message イベントからチャットメッセージを構築
///
/// タイムスタンプはイベント本体ではなくフレームのmetadataに入っている点に注意。
/// 必須フィールドが欠けている場合はNone（ログのみ）
pub fn chat_message_from_event(
    event: &Value,
    timestamp: Option<DateTime<Utc>>,
) -> Option<ChatMessage> {
    let id = event.get("message_id").and_then(Value::as_str)?;
    let user_id = event.get("chatter_user_id").and_then(Value::as_str)?;
    let user_login = event.get("chatter_user_login").and_then(Value::as_str)?;
    let user_name = event.get("chatter_user_name").and_then(Value::as_str)?;
    let text = event.pointer("/message/text").and_then(Value::as_str)?;

    let color = event
        .get("color")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Some(ChatMessage {
        id: id.to_string(),
        user_id: user_id.to_string(),
        user_login: user_login.to_string(),
        user_name: user_name.to_string(),
        text: text.to_string(),
        timestamp: timestamp.unwrap_or_else(Utc::now),
        color,
        badges: parse_badges(event),
    })
}

/// バッジ一覧を許可リストに通して抽出
///
/// 許可リスト外のバッジはエラーにせず黙って落とす
fn parse_badges(event: &Value) -> Vec<ChatBadge> {
    let mut badges = Vec::new();

    if let Some(list) = event.get("badges").and_then(Value::as_array) {
        for badge in list {
            let set_id = badge.get("set_id").and_then(Value::as_str).unwrap_or("");
            if let Some(badge_type) = BadgeType::from_set_id(set_id) {
                let info = badge
                    .get("info")
                    .and_then(Value::as_str)
                    .filter(|i| !i.is_empty())
                    .map(str::to_string);
                badges.push(ChatBadge { badge_type, info });
            }
        }
    }

    badges
}

/// チャット以外のチャンネルイベントを人間可読な通知に変換
///
/// 未知のイベントタイプは "Channel event: <type>" にフォールバックし、
/// 決してエラーにしない
pub fn notification_from_event(
    subscription_type: &str,
    event: &Value,
    timestamp: Option<DateTime<Utc>>,
) -> ChannelNotification {
    let user_name = event.get("user_name").and_then(Value::as_str).unwrap_or("");

    let message = match subscription_type {
        "channel.chat_settings.update" => format_chat_settings(event),
        "channel.moderator.add" => format!("{} has been made a moderator", user_name),
        "channel.moderator.remove" => format!("{} is no longer a moderator", user_name),
        "channel.ban" => {
            let reason = event
                .get("reason")
                .and_then(Value::as_str)
                .filter(|r| !r.is_empty());
            match reason {
                Some(reason) => format!("{} has been banned: {}", user_name, reason),
                None => format!("{} has been banned", user_name),
            }
        }
        "channel.unban" => format!("{} has been unbanned", user_name),
        other => format!("Channel event: {}", other),
    };

    ChannelNotification {
        id: format!("notification_{}", Uuid::new_v4()),
        event_type: subscription_type.to_string(),
        message,
        timestamp: timestamp.unwrap_or_else(Utc::now),
    }
}

/// チャット設定変更イベントを1つの文に整形
///
/// 変更された設定をカンマ区切りで連結。何も検出できなければ汎用文
fn format_chat_settings(event: &Value) -> String {
    let mut messages: Vec<String> = Vec::new();

    if let Some(enabled) = event.get("emote_mode").and_then(Value::as_bool) {
        messages.push(
            if enabled {
                "Emote Only Mode enabled"
            } else {
                "Emote Only Mode disabled"
            }
            .to_string(),
        );
    }

    if let Some(enabled) = event.get("follower_mode").and_then(Value::as_bool) {
        if enabled {
            let duration = event
                .get("follower_mode_duration_minutes")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            if duration > 0 {
                messages.push(format!("Followers Only Mode enabled ({} minutes)", duration));
            } else {
                messages.push("Followers Only Mode enabled".to_string());
            }
        } else {
            messages.push("Followers Only Mode disabled".to_string());
        }
    }

    if let Some(enabled) = event.get("slow_mode").and_then(Value::as_bool) {
        if enabled {
            let wait = event
                .get("slow_mode_wait_time_seconds")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            messages.push(format!("Slow Mode enabled ({} seconds)", wait));
        } else {
            messages.push("Slow Mode disabled".to_string());
        }
    }

    if let Some(enabled) = event.get("subscriber_mode").and_then(Value::as_bool) {
        messages.push(
            if enabled {
                "Subscribers Only Mode enabled"
            } else {
                "Subscribers Only Mode disabled"
            }
            .to_string(),
        );
    }

    if let Some(enabled) = event.get("unique_chat_mode").and_then(Value::as_bool) {
        messages.push(
            if enabled {
                "Unique Chat Mode enabled"
            } else {
                "Unique Chat Mode disabled"
            }
            .to_string(),
        );
    }

    if messages.is_empty() {
        "Chat settings updated".to_string()
    } else {
        messages.join(", ")
    }
}
