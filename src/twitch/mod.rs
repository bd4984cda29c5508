// =============================================================================
// Twitch Helix API連携モジュール
// =============================================================================
// ユーザー情報の解決、EventSubサブスクリプションの作成・削除、
// チャット送信、エモート取得のHTTPクライアントを提供
//
// 使用API: Twitch Helix
// https://dev.twitch.tv/docs/api/
// =============================================================================

mod client;
mod errors;
pub mod types;

pub use client::HelixClient;
pub use errors::TwitchError;
pub use types::TwitchUser;
