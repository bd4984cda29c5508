use thiserror::Error;

/// 単一プロバイダーのフェッチエラー
///
/// 集約処理には伝播しない。各プロバイダーの失敗はログに残した上で
/// 空のリストに縮退する
#[derive(Error, Debug)]
pub enum EmoteError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{provider} API error: {status}")]
    ApiError { provider: &'static str, status: u16 },
}
