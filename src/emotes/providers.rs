//! エモートプロバイダー別フェッチャー
//!
//! Twitch Helix / 7TV / BetterTTV / FrankerFaceZ の4プロバイダーから
//! エモート一覧を取得する。各プロバイダーの失敗は孤立させ、
//! ログに残した上で空のリストに縮退する（集約全体は失敗させない）

use chrono::Utc;
use reqwest::{Client, StatusCode};

use super::errors::EmoteError;
use super::types::*;
use crate::config::http_timeout;
use crate::twitch::{types::HelixEmote, HelixClient, TwitchError};

/// 7TV APIのベースURL
const SEVENTV_API_BASE: &str = "https://7tv.io/v3";

/// 7TVグローバルエモートセットの固定ID
const SEVENTV_GLOBAL_SET_ID: &str = "global";

/// BetterTTV APIのベースURL
const BTTV_API_BASE: &str = "https://api.betterttv.net/3";

/// FrankerFaceZ APIのベースURL
const FFZ_API_BASE: &str = "https://api.frankerfacez.com/v1";

/// サードパーティエモートAPIのクライアント
pub struct EmoteProviders {
    client: Client,
    seventv_base: String,
    bttv_base: String,
    ffz_base: String,
}

impl EmoteProviders {
    pub fn new() -> Self {
        Self::with_base_urls(
            SEVENTV_API_BASE.to_string(),
            BTTV_API_BASE.to_string(),
            FFZ_API_BASE.to_string(),
        )
    }

    /// ベースURLを指定してクライアントを作成（テスト用）
    pub fn with_base_urls(seventv_base: String, bttv_base: String, ffz_base: String) -> Self {
        let client = Client::builder()
            .timeout(http_timeout())
            .build()
            .expect("Failed to build HTTP client with timeout - this should never fail");

        Self {
            client,
            seventv_base,
            bttv_base,
            ffz_base,
        }
    }

    /// Twitchエモートを取得（グローバル + ユーザー利用可能分）
    ///
    /// 両クエリともpagination.cursorが尽きるまでページを辿る
    pub async fn twitch_emotes(
        &self,
        api: &HelixClient,
        broadcaster_id: &str,
        user_id: &str,
    ) -> Vec<Emote> {
        let (global, user) = tokio::join!(
            self.fetch_twitch_global(api),
            self.fetch_twitch_user(api, broadcaster_id, user_id),
        );

        let mut emotes = Vec::new();
        match global {
            Ok(list) => emotes.extend(list),
            Err(e) => log::error!("Error loading Twitch global emotes: {}", e),
        }
        match user {
            Ok(list) => emotes.extend(list),
            Err(e) => log::error!("Error loading Twitch user emotes: {}", e),
        }
        emotes
    }

    async fn fetch_twitch_global(&self, api: &HelixClient) -> Result<Vec<Emote>, TwitchError> {
        let mut emotes = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = api.get_global_emotes(cursor.as_deref()).await?;
            for emote in &page.data {
                emotes.push(emote_from_template(&page.template, emote, "global_", "Global"));
            }
            cursor = page.pagination.cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(emotes)
    }

    async fn fetch_twitch_user(
        &self,
        api: &HelixClient,
        broadcaster_id: &str,
        user_id: &str,
    ) -> Result<Vec<Emote>, TwitchError> {
        let mut emotes = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = api
                .get_user_emotes(broadcaster_id, user_id, cursor.as_deref())
                .await?;
            for emote in &page.data {
                emotes.push(emote_from_template(&page.template, emote, "user_", "Available"));
            }
            cursor = page.pagination.cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(emotes)
    }

    /// 7TVエモートを取得（グローバルセット + チャンネルセット）
    ///
    /// チャンネル側の404はセット未設定の正常系として空を返す
    pub async fn seventv_emotes(&self, broadcaster_id: &str) -> Vec<Emote> {
        let (global, channel) = tokio::join!(
            self.fetch_seventv_global(),
            self.fetch_seventv_channel(broadcaster_id),
        );

        let mut emotes = Vec::new();
        match global {
            Ok(list) => emotes.extend(list),
            Err(e) => log::info!("7TV global emotes not available: {}", e),
        }
        match channel {
            Ok(list) => emotes.extend(list),
            Err(e) => log::info!("7TV emotes not available: {}", e),
        }
        emotes
    }

    async fn fetch_seventv_global(&self) -> Result<Vec<Emote>, EmoteError> {
        let url = format!("{}/emote-sets/{}", self.seventv_base, SEVENTV_GLOBAL_SET_ID);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(EmoteError::ApiError {
                provider: "7TV",
                status: response.status().as_u16(),
            });
        }

        let set: SevenTvEmoteSet = response.json().await?;
        Ok(set
            .emotes
            .into_iter()
            .map(|e| seventv_emote(e, Some("Global".to_string())))
            .collect())
    }

    async fn fetch_seventv_channel(&self, broadcaster_id: &str) -> Result<Vec<Emote>, EmoteError> {
        let url = format!("{}/users/twitch/{}", self.seventv_base, broadcaster_id);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                // 7TV未設定のチャンネルでは正常系
                log::info!(
                    "Channel (ID: {}) does not have 7TV emotes configured",
                    broadcaster_id
                );
                return Ok(Vec::new());
            }
            status => {
                log::warn!(
                    "7TV API returned {} for channel (ID: {})",
                    status,
                    broadcaster_id
                );
                return Err(EmoteError::ApiError {
                    provider: "7TV",
                    status: status.as_u16(),
                });
            }
        }

        let user: SevenTvUserResponse = response.json().await?;
        Ok(user
            .emote_set
            .map(|set| {
                set.emotes
                    .into_iter()
                    .map(|e| seventv_emote(e, None))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// BetterTTVエモートを取得（グローバル + チャンネル + 共有セット）
    ///
    /// どれか1つのセットが欠けても他のセットは取得する
    pub async fn bttv_emotes(&self, broadcaster_id: &str) -> Vec<Emote> {
        let (global, channel) = tokio::join!(
            self.fetch_bttv_global(),
            self.fetch_bttv_channel(broadcaster_id),
        );

        let mut emotes = Vec::new();
        match global {
            Ok(list) => emotes.extend(list),
            Err(e) => log::info!("BetterTTV global emotes not available: {}", e),
        }
        match channel {
            Ok(list) => emotes.extend(list),
            Err(e) => log::info!("BetterTTV emotes not available: {}", e),
        }
        emotes
    }

    async fn fetch_bttv_global(&self) -> Result<Vec<Emote>, EmoteError> {
        let url = format!("{}/cached/emotes/global", self.bttv_base);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(EmoteError::ApiError {
                provider: "BetterTTV",
                status: response.status().as_u16(),
            });
        }

        let list: Vec<BttvEmote> = response.json().await?;
        Ok(list
            .into_iter()
            .map(|e| bttv_emote(e, "Global"))
            .collect())
    }

    async fn fetch_bttv_channel(&self, broadcaster_id: &str) -> Result<Vec<Emote>, EmoteError> {
        let url = format!("{}/cached/users/twitch/{}", self.bttv_base, broadcaster_id);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                log::info!(
                    "Channel (ID: {}) does not have BetterTTV emotes configured",
                    broadcaster_id
                );
                return Ok(Vec::new());
            }
            status => {
                log::warn!(
                    "BetterTTV API returned {} for channel (ID: {})",
                    status,
                    broadcaster_id
                );
                return Err(EmoteError::ApiError {
                    provider: "BetterTTV",
                    status: status.as_u16(),
                });
            }
        }

        let user: BttvUserResponse = response.json().await?;
        let mut emotes: Vec<Emote> = user
            .channel_emotes
            .into_iter()
            .map(|e| bttv_emote(e, "Channel"))
            .collect();
        emotes.extend(user.shared_emotes.into_iter().map(|e| bttv_emote(e, "Shared")));
        Ok(emotes)
    }

    /// FrankerFaceZエモートを取得（グローバルセット + ルームセット）
    ///
    /// エモートは複数の名前付きセットに分かれているため平坦化する
    pub async fn ffz_emotes(&self, broadcaster_id: &str) -> Vec<Emote> {
        let (global, room) = tokio::join!(
            self.fetch_ffz_sets(format!("{}/set/global", self.ffz_base), "global"),
            self.fetch_ffz_sets(
                format!("{}/room/id/{}", self.ffz_base, broadcaster_id),
                "room",
            ),
        );

        let mut emotes = Vec::new();
        match global {
            Ok(list) => emotes.extend(list),
            Err(e) => log::info!("FrankerFaceZ global emotes not available: {}", e),
        }
        match room {
            Ok(list) => emotes.extend(list),
            Err(e) => log::info!("FrankerFaceZ emotes not available: {}", e),
        }
        emotes
    }

    async fn fetch_ffz_sets(&self, url: String, kind: &str) -> Result<Vec<Emote>, EmoteError> {
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                log::info!("No FrankerFaceZ {} sets found", kind);
                return Ok(Vec::new());
            }
            status => {
                return Err(EmoteError::ApiError {
                    provider: "FrankerFaceZ",
                    status: status.as_u16(),
                });
            }
        }

        let sets: FfzSetsResponse = response.json().await?;
        let mut emotes = Vec::new();
        for set in sets.sets.into_values() {
            for emoticon in set.emoticons {
                if let Some(emote) = ffz_emote(emoticon) {
                    emotes.push(emote);
                }
            }
        }
        Ok(emotes)
    }
}

impl Default for EmoteProviders {
    fn default() -> Self {
        Self::new()
    }
}

/// HelixエモートをURLテンプレートから構築
///
/// テンプレートの {{id}}/{{format}}/{{theme_mode}}/{{scale}} を置換。
/// formatはアニメーション版を優先する
fn emote_from_template(
    template: &str,
    emote: &HelixEmote,
    id_prefix: &str,
    source: &str,
) -> Emote {
    let format = if emote.format.iter().any(|f| f == "animated") {
        "animated"
    } else {
        emote.format.first().map(String::as_str).unwrap_or("static")
    };
    let theme_mode = emote
        .theme_mode
        .first()
        .map(String::as_str)
        .unwrap_or("light");

    let url = template
        .replace("{{id}}", &emote.id)
        .replace("{{format}}", format)
        .replace("{{theme_mode}}", theme_mode)
        .replace("{{scale}}", "2.0");

    Emote {
        id: format!("{}{}", id_prefix, emote.id),
        name: emote.name.clone(),
        url,
        provider: EmoteProvider::Twitch,
        source: Some(source.to_string()),
        resolved_at: Utc::now(),
    }
}

fn seventv_emote(emote: SevenTvEmote, source: Option<String>) -> Emote {
    let url = format!("https://cdn.7tv.app/emote/{}/2x.webp", emote.id);
    Emote {
        id: emote.id,
        name: emote.name,
        url,
        provider: EmoteProvider::SevenTv,
        source,
        resolved_at: Utc::now(),
    }
}

fn bttv_emote(emote: BttvEmote, source: &str) -> Emote {
    let url = format!("https://cdn.betterttv.net/emote/{}/2x", emote.id);
    Emote {
        id: emote.id,
        name: emote.code,
        url,
        provider: EmoteProvider::BetterTtv,
        source: Some(source.to_string()),
        resolved_at: Utc::now(),
    }
}

/// FFZエモートを構築。2xスケール優先、なければ1x。URL無しはスキップ
fn ffz_emote(emoticon: FfzEmoticon) -> Option<Emote> {
    let url = emoticon
        .urls
        .get("2")
        .or_else(|| emoticon.urls.get("1"))?
        .clone();

    // 古いAPIはプロトコル相対URLを返す
    let url = if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url
    };

    Some(Emote {
        id: emoticon.id.to_string(),
        name: emoticon.name,
        url,
        provider: EmoteProvider::FrankerFaceZ,
        source: None,
        resolved_at: Utc::now(),
    })
}
