// =============================================================================
// 共通設定・定数モジュール
// =============================================================================
// ライブラリ全体で使用する共通の設定値・定数を定義
// =============================================================================

use std::time::Duration;

/// Twitch Developer Console で登録したクライアントID
///
/// 別のアプリケーションとして利用する場合は
/// https://dev.twitch.tv/console でアプリを登録して差し替えること
pub const TWITCH_CLIENT_ID: &str = "4iu9xwadj4m2hdbilfa7fxwaqrkz49";

/// Helix APIのベースURL
pub const HELIX_API_BASE: &str = "https://api.twitch.tv/helix";

/// EventSub WebSocketエンドポイント
///
/// keepalive_timeout_seconds はサーバー側のkeepalive送信間隔の指定
pub const EVENTSUB_WS_URL: &str =
    "wss://eventsub.wss.twitch.tv/ws?keepalive_timeout_seconds=30";

/// OAuthで要求するスコープ一覧
pub const TWITCH_OAUTH_SCOPES: &[&str] = &[
    "user:read:email",
    "user:read:follows",
    "user:read:chat",
    "user:write:chat",
    "user:read:emotes",
];

/// HTTPリクエストのデフォルトタイムアウト（秒）
///
/// Helix API、エモートプロバイダーAPI など外部APIへのリクエストで使用。
/// ネットワーク状況が悪い場合でも適切にタイムアウトし、
/// 呼び出し側を長時間待たせないようにする。
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// HTTPリクエストのデフォルトタイムアウト（Duration）
///
/// HTTPクライアント構築時に直接使用可能
pub fn http_timeout() -> Duration {
    Duration::from_secs(HTTP_TIMEOUT_SECS)
}
