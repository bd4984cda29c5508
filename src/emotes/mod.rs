// =============================================================================
// エモート集約モジュール
// =============================================================================
// 4つの独立したプロバイダー（Twitch / 7TV / BetterTTV / FrankerFaceZ）
// からエモートカタログを取得し、1つの名前キーのカタログにマージする
//
// 機能:
// - プロバイダー並行フェッチ（各プロバイダーの失敗は空リストに縮退）
// - 名前衝突の検出とログ（最初のプロバイダーが勝つ）
// - チャンネル別stale-while-revalidateキャッシュ
// - カタログを使ったメッセージのトークン化
// =============================================================================

mod aggregator;
mod cache;
mod errors;
mod providers;
pub mod tokenizer;
pub mod types;

pub use aggregator::{merge_catalogs, EmoteAggregator};
pub use cache::EmoteCache;
pub use errors::EmoteError;
pub use providers::EmoteProviders;
pub use tokenizer::{tokenize, MessageSegment};
pub use types::{Emote, EmoteCatalog, EmoteProvider};
