use std::time::Duration;

/// 再接続の最大試行回数
/// これを超えると自動再接続を停止する（呼び出し側の再connectが必要）
const MAX_ATTEMPTS: u32 = 5;

/// 再接続の基本待機時間（ミリ秒）
const BASE_DELAY_MS: u64 = 1000;

/// 指数バックオフを管理する構造体
/// 切断時の再接続間隔を指数的に増加させる（1s→2s→4s→8s→16s）
pub struct ReconnectBackoff {
    base_delay: Duration,
    max_attempts: u32,
    current_attempt: u32,
}

impl ReconnectBackoff {
    /// 新しいReconnectBackoffインスタンスを作成
    ///
    /// デフォルト設定:
    /// - base_delay: 1000ミリ秒
    /// - max_attempts: 5回
    pub fn new() -> Self {
        Self {
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_attempts: MAX_ATTEMPTS,
            current_attempt: 0,
        }
    }

    /// カスタム設定でReconnectBackoffインスタンスを作成
    pub fn with_config(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            current_attempt: 0,
        }
    }

    /// 次の再接続までの待機時間を計算して返す
    ///
    /// 計算式: base_delay * 2^current_attempt
    /// k回目の呼び出しは base_delay * 2^(k-1) を返す
    pub fn next_delay(&mut self) -> Duration {
        // 指数は31でクランプし、2^32以上によるオーバーフローを防ぐ
        let exponent = self.current_attempt.min(31);
        let delay = self.base_delay.saturating_mul(2u32.pow(exponent));
        self.current_attempt += 1;
        delay
    }

    /// バックオフカウンターをリセット（接続成功時に呼び出す）
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    /// 現在の試行回数を取得
    pub fn attempt_count(&self) -> u32 {
        self.current_attempt
    }

    /// 最大試行回数に達したかどうかを確認
    pub fn has_exceeded_max_attempts(&self) -> bool {
        self.current_attempt >= self.max_attempts
    }

    /// 再接続を続行すべきかどうかを確認
    pub fn should_retry(&self) -> bool {
        !self.has_exceeded_max_attempts()
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}
