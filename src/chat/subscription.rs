use std::sync::Arc;
use thiserror::Error;

use crate::twitch::{HelixClient, TwitchError};

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Cannot create subscription without session ID")]
    NoSession,

    #[error("Subscription already exists for this connection")]
    AlreadySubscribed,

    #[error(transparent)]
    Api(#[from] TwitchError),
}

/// EventSubサブスクリプションのライフサイクル管理
///
/// 1つの接続インスタンスにつき、1チャンネル分のサブスクリプションを
/// 最大1件だけ所有する。所有したサブスクリプションは終了処理で
/// ベストエフォート削除する（他のサブスクリプションには触れない）
pub struct SubscriptionManager {
    api: Arc<HelixClient>,
    channel: String,
    subscription_id: Option<String>,
    subscribed: bool,
    /// サーバー側で「既に存在する」と返された場合（HTTP 409）を
    /// 成功として扱うかどうか。再接続直後の重複ノイズを抑えるため
    /// デフォルトはtrue
    pub duplicate_is_success: bool,
}

impl SubscriptionManager {
    pub fn new(api: Arc<HelixClient>, channel: String) -> Self {
        Self {
            api,
            channel,
            subscription_id: None,
            subscribed: false,
            duplicate_is_success: true,
        }
    }

    /// サブスクリプションを作成
    ///
    /// 前提条件:
    /// - セッションIDが確定していること（`NoSession`）
    /// - この接続インスタンスが未購読であること（`AlreadySubscribed`）
    ///
    /// 認証済みユーザーと対象チャンネルの解決は並行して行う
    pub async fn create(&mut self, session_id: Option<&str>) -> Result<(), SubscriptionError> {
        let session_id = session_id.ok_or(SubscriptionError::NoSession)?;
        if self.subscribed {
            return Err(SubscriptionError::AlreadySubscribed);
        }

        let (current_user, broadcaster) = tokio::try_join!(
            self.api.get_user(None),
            self.api.get_user(Some(&self.channel)),
        )
        .map_err(SubscriptionError::Api)?;

        match self
            .api
            .create_chat_subscription(session_id, &broadcaster.id, &current_user.id)
            .await
        {
            Ok(id) => {
                log::info!(
                    "Chat subscription created for {} with ID: {}",
                    self.channel,
                    id
                );
                self.subscription_id = Some(id);
                self.subscribed = true;
                Ok(())
            }
            Err(TwitchError::SubscriptionConflict) if self.duplicate_is_success => {
                // サーバー側に同一条件のサブスクリプションが残っている。
                // 再接続直後に起きる正常系なので成功扱いにする
                log::warn!(
                    "Subscription for {} already exists on server, treating as success",
                    self.channel
                );
                self.subscribed = true;
                Ok(())
            }
            Err(e) => {
                // IDは未設定のまま残し、リトライ可能にする
                log::error!("Error creating chat subscription: {}", e);
                Err(SubscriptionError::Api(e))
            }
        }
    }

    /// 所有するサブスクリプションIDを取得
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription_id.as_deref()
    }

    /// 購読済みかどうか
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// 所有するサブスクリプションをベストエフォートで削除
    ///
    /// 削除は自分が作成した1件に対してのみ、ちょうど1回試行する。
    /// 失敗してもログに残すだけで致命的エラーにはしない
    pub async fn delete(&mut self) {
        if let Some(id) = self.subscription_id.take() {
            match self.api.delete_subscription(&id).await {
                Ok(()) => log::info!("Deleted subscription: {}", id),
                Err(e) => log::error!("Error deleting subscription {}: {}", id, e),
            }
        }
        self.subscribed = false;
    }

    /// 購読状態をリセット（削除は行わない）
    ///
    /// トランスポート切断時に呼び出す。サーバー側のサブスクリプションは
    /// セッションと共に消えるため、次のwelcomeで再作成する
    pub fn reset(&mut self) {
        self.subscription_id = None;
        self.subscribed = false;
    }
}
