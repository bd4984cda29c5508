use reqwest::{Client, StatusCode};

use super::{errors::TwitchError, types::*};
use crate::config::{self, http_timeout};
use crate::util::mask_token;

pub struct HelixClient {
    client: Client,
    token: String,
    client_id: String,
    base_url: String,
}

impl HelixClient {
    pub fn new(token: String, client_id: String) -> Self {
        Self::with_base_url(token, client_id, config::HELIX_API_BASE.to_string())
    }

    /// ベースURLを指定してクライアントを作成（テスト用）
    pub fn with_base_url(token: String, client_id: String, base_url: String) -> Self {
        // タイムアウトなしのクライアントにフォールバックすると
        // 外部APIがハングした場合に呼び出し側が固まるため、
        // 構築失敗時はpanicさせる（起動時のみ発生し得る）
        let client = Client::builder()
            .timeout(http_timeout())
            .build()
            .expect("Failed to build HTTP client with timeout - this should never fail");

        log::debug!("Helix client created (token: {})", mask_token(&token));

        Self {
            client,
            token,
            client_id,
            base_url,
        }
    }

    /// ユーザー情報を取得
    ///
    /// `login` が `None` の場合はトークンの持ち主（認証済みユーザー）を返す
    pub async fn get_user(&self, login: Option<&str>) -> Result<TwitchUser, TwitchError> {
        let url = format!("{}/users", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Client-Id", &self.client_id);
        if let Some(login) = login {
            request = request.query(&[("login", login)]);
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                log::warn!("User lookup failed: token invalid or expired");
                return Err(TwitchError::InvalidToken);
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                log::error!("User lookup failed: {} - {}", status, message);
                return Err(TwitchError::ApiError {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        let users: UsersResponse = response.json().await?;

        users.data.into_iter().next().ok_or_else(|| match login {
            Some(login) => TwitchError::UserNotFound(login.to_string()),
            None => TwitchError::CurrentUserNotFound,
        })
    }

    /// チャットメッセージのEventSubサブスクリプションを作成
    ///
    /// 成功時はサブスクリプションIDを返す。
    /// 既に同一条件のサブスクリプションが存在する場合（HTTP 409）は
    /// `SubscriptionConflict` を返し、冪等処理の判断は呼び出し側に委ねる。
    pub async fn create_chat_subscription(
        &self,
        session_id: &str,
        broadcaster_id: &str,
        user_id: &str,
    ) -> Result<String, TwitchError> {
        let url = format!("{}/eventsub/subscriptions", self.base_url);

        let body = CreateSubscriptionRequest {
            subscription_type: CHAT_MESSAGE_SUBSCRIPTION_TYPE.to_string(),
            version: "1".to_string(),
            condition: SubscriptionCondition {
                broadcaster_user_id: broadcaster_id.to_string(),
                user_id: user_id.to_string(),
            },
            transport: SubscriptionTransport {
                method: "websocket".to_string(),
                session_id: session_id.to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Client-Id", &self.client_id)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::CONFLICT {
            log::warn!("Chat subscription already exists on the server");
            return Err(TwitchError::SubscriptionConflict);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(TwitchError::InvalidToken);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            log::error!("Subscription create failed: {} - {}", status, message);
            return Err(TwitchError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let created: SubscriptionsResponse = response.json().await?;
        let subscription = created.data.into_iter().next().ok_or_else(|| {
            TwitchError::ParseError("Subscription response contained no data".to_string())
        })?;

        log::info!("Chat subscription created: {}", subscription.id);
        Ok(subscription.id)
    }

    /// EventSubサブスクリプションを削除
    pub async fn delete_subscription(&self, subscription_id: &str) -> Result<(), TwitchError> {
        let url = format!("{}/eventsub/subscriptions", self.base_url);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .header("Client-Id", &self.client_id)
            .query(&[("id", subscription_id)])
            .send()
            .await?;

        let status = response.status();
        // 既に消えている場合も削除済みとして扱う
        if status.is_success() || status == StatusCode::NOT_FOUND {
            log::info!("Subscription deleted: {}", subscription_id);
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(TwitchError::ApiError {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// このトークンが所有する全EventSubサブスクリプションを削除
    ///
    /// 明示的に呼び出すメンテナンス操作。通常のセッション終了処理では
    /// 使用しない（終了処理は自分が作成した1件のみを削除する）。
    pub async fn delete_all_subscriptions(&self) -> Result<u32, TwitchError> {
        let url = format!("{}/eventsub/subscriptions", self.base_url);
        let mut deleted = 0u32;
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .header("Client-Id", &self.client_id);
            if let Some(cursor) = cursor.as_deref() {
                request = request.query(&[("after", cursor)]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(TwitchError::ApiError {
                    status: status.as_u16(),
                    message,
                });
            }

            let page: SubscriptionsResponse = response.json().await?;
            for subscription in &page.data {
                if let Err(e) = self.delete_subscription(&subscription.id).await {
                    log::warn!("Failed to delete subscription {}: {}", subscription.id, e);
                } else {
                    deleted += 1;
                }
            }

            cursor = page.pagination.cursor;
            if cursor.is_none() {
                break;
            }
        }

        log::info!("Bulk subscription cleanup removed {} subscriptions", deleted);
        Ok(deleted)
    }

    /// チャットメッセージを送信
    pub async fn send_chat_message(
        &self,
        broadcaster_id: &str,
        sender_id: &str,
        message: &str,
    ) -> Result<(), TwitchError> {
        let url = format!("{}/chat/messages", self.base_url);

        let body = SendMessageRequest {
            broadcaster_id: broadcaster_id.to_string(),
            sender_id: sender_id.to_string(),
            message: message.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Client-Id", &self.client_id)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            log::error!("Chat send failed: {} - {}", status, message);
            return Err(TwitchError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let sent: SendMessageResponse = response.json().await?;
        if let Some(result) = sent.data.first() {
            if !result.is_sent {
                let reason = result
                    .drop_reason
                    .as_ref()
                    .map(|r| r.message.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                log::warn!("Chat message was dropped by Twitch: {}", reason);
                return Err(TwitchError::ApiError {
                    status: status.as_u16(),
                    message: format!("Message dropped: {}", reason),
                });
            }
        }

        Ok(())
    }

    /// グローバルエモートの1ページを取得
    pub async fn get_global_emotes(
        &self,
        cursor: Option<&str>,
    ) -> Result<EmotesResponse, TwitchError> {
        let url = format!("{}/chat/emotes/global", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Client-Id", &self.client_id);
        if let Some(cursor) = cursor {
            request = request.query(&[("after", cursor)]);
        }

        self.emotes_page(request).await
    }

    /// 認証済みユーザーが利用可能なエモートの1ページを取得
    ///
    /// チャンネルエモート・サブスクエモートを含む
    pub async fn get_user_emotes(
        &self,
        broadcaster_id: &str,
        user_id: &str,
        cursor: Option<&str>,
    ) -> Result<EmotesResponse, TwitchError> {
        let url = format!("{}/chat/emotes/user", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Client-Id", &self.client_id)
            .query(&[("broadcaster_id", broadcaster_id), ("user_id", user_id)]);
        if let Some(cursor) = cursor {
            request = request.query(&[("after", cursor)]);
        }

        self.emotes_page(request).await
    }

    async fn emotes_page(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<EmotesResponse, TwitchError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TwitchError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(server: &mockito::ServerGuard) -> HelixClient {
        HelixClient::with_base_url(
            "test-token-1234567890".to_string(),
            "test-client-id".to_string(),
            server.url(),
        )
    }

    #[tokio::test]
    async fn test_get_user_by_login() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users?login=somechannel")
            .with_status(200)
            .with_body(
                r#"{"data":[{"id":"123","login":"somechannel","display_name":"SomeChannel"}]}"#,
            )
            .create_async()
            .await;

        let user = test_client(&server)
            .get_user(Some("somechannel"))
            .await
            .unwrap();

        assert_eq!(user.id, "123");
        assert_eq!(user.display_name, "SomeChannel");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users?login=ghost")
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let err = test_client(&server).get_user(Some("ghost")).await.unwrap_err();
        assert!(matches!(err, TwitchError::UserNotFound(login) if login == "ghost"));
    }

    #[tokio::test]
    async fn test_create_subscription_conflict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/eventsub/subscriptions")
            .with_status(409)
            .with_body(r#"{"error":"Conflict","status":409,"message":"subscription already exists"}"#)
            .create_async()
            .await;

        let err = test_client(&server)
            .create_chat_subscription("sess-1", "123", "456")
            .await
            .unwrap_err();
        assert!(matches!(err, TwitchError::SubscriptionConflict));
    }

    #[tokio::test]
    async fn test_create_subscription_returns_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/eventsub/subscriptions")
            .with_status(202)
            .with_body(r#"{"data":[{"id":"sub-abc","type":"channel.chat.message","status":"enabled"}]}"#)
            .create_async()
            .await;

        let id = test_client(&server)
            .create_chat_subscription("sess-1", "123", "456")
            .await
            .unwrap();
        assert_eq!(id, "sub-abc");
    }
}
