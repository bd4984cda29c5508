//! エモート集約エンジン
//!
//! 4プロバイダーからのフェッチ、名前をキーとするマージ、
//! チャンネル別のstale-while-revalidateキャッシュを担う

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::cache::EmoteCache;
use super::providers::EmoteProviders;
use super::types::{Emote, EmoteCatalog};
use crate::twitch::{HelixClient, TwitchError};

/// エモート集約エンジン
///
/// クローンは同じキャッシュとクライアントを共有する
#[derive(Clone)]
pub struct EmoteAggregator {
    inner: Arc<AggregatorInner>,
}

struct AggregatorInner {
    api: Arc<HelixClient>,
    providers: EmoteProviders,
    cache: EmoteCache,
    /// バックグラウンド再取得が進行中のチャンネル
    refreshing: Mutex<HashSet<String>>,
}

impl EmoteAggregator {
    pub fn new(api: Arc<HelixClient>) -> Self {
        Self::with_providers(api, EmoteProviders::new())
    }

    /// プロバイダークライアントを指定して作成（テスト用）
    pub fn with_providers(api: Arc<HelixClient>, providers: EmoteProviders) -> Self {
        Self {
            inner: Arc::new(AggregatorInner {
                api,
                providers,
                cache: EmoteCache::new(),
                refreshing: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// チャンネルのエモートカタログを取得
    ///
    /// キャッシュヒット時は即座にキャッシュを返し、バックグラウンドで
    /// 再取得して丸ごと置き換える（stale-while-revalidate）。
    /// ミス時は初回フェッチの完了までブロックする。
    ///
    /// 個々のプロバイダーの失敗は空のリストに縮退するため、
    /// この呼び出しが失敗するのはユーザー解決に失敗した場合のみ。
    /// バックグラウンド再取得はチャンネルごとに同時1件まで
    pub async fn load_emotes(&self, channel: &str) -> Result<EmoteCatalog, TwitchError> {
        if let Some(cached) = self.inner.cache.get(channel).await {
            if self.begin_refresh(channel).await {
                let this = self.clone();
                let channel = channel.to_string();
                tokio::spawn(async move {
                    match this.fetch_catalog(&channel).await {
                        Ok(catalog) => this.inner.cache.replace(&channel, catalog).await,
                        Err(e) => {
                            log::warn!("Background emote refresh failed for {}: {}", channel, e)
                        }
                    }
                    this.end_refresh(&channel).await;
                });
            }
            return Ok(cached);
        }

        let catalog = self.fetch_catalog(channel).await?;
        self.inner.cache.replace(channel, catalog.clone()).await;
        Ok(catalog)
    }

    /// キャッシュを無視して再取得し、カタログを置き換える
    pub async fn refresh(&self, channel: &str) -> Result<EmoteCatalog, TwitchError> {
        let catalog = self.fetch_catalog(channel).await?;
        self.inner.cache.replace(channel, catalog.clone()).await;
        Ok(catalog)
    }

    /// チャンネルの再取得スロットを確保。既に進行中ならfalse
    async fn begin_refresh(&self, channel: &str) -> bool {
        self.inner.refreshing.lock().await.insert(channel.to_string())
    }

    async fn end_refresh(&self, channel: &str) {
        self.inner.refreshing.lock().await.remove(channel);
    }

    /// 全プロバイダーからフェッチしてマージ（内部実装）
    async fn fetch_catalog(&self, channel: &str) -> Result<EmoteCatalog, TwitchError> {
        // ユーザー解決の失敗のみが集約全体の失敗になる
        let (current_user, broadcaster) = tokio::try_join!(
            self.inner.api.get_user(None),
            self.inner.api.get_user(Some(channel)),
        )?;

        let providers = &self.inner.providers;
        let (twitch, seventv, bttv, ffz) = tokio::join!(
            providers.twitch_emotes(&self.inner.api, &broadcaster.id, &current_user.id),
            providers.seventv_emotes(&broadcaster.id),
            providers.bttv_emotes(&broadcaster.id),
            providers.ffz_emotes(&broadcaster.id),
        );

        log::info!(
            "Loaded emotes for {}: twitch={}, 7tv={}, bttv={}, ffz={}",
            channel,
            twitch.len(),
            seventv.len(),
            bttv.len(),
            ffz.len()
        );

        Ok(merge_catalogs(vec![twitch, seventv, bttv, ffz]))
    }
}

/// プロバイダー別リストを1つの名前キーのカタログにマージ
///
/// 挿入順（Twitch → 7TV → BetterTTV → FrankerFaceZ）で最初に
/// 名前を確保したエモートが勝つ。後続のプロバイダーが同名で異なる
/// URLまたは提供元を持ってきた場合は衝突としてログに残すが、
/// 上書きはしない
pub fn merge_catalogs(provider_lists: Vec<Vec<Emote>>) -> EmoteCatalog {
    let mut merged: HashMap<String, Emote> = HashMap::new();
    let mut conflicts = 0u32;

    for emote in provider_lists.into_iter().flatten() {
        match merged.get(&emote.name) {
            None => {
                merged.insert(emote.name.clone(), emote);
            }
            Some(existing) => {
                if existing.url != emote.url || existing.provider != emote.provider {
                    conflicts += 1;
                    log::warn!(
                        "Emote name conflict for \"{}\": keeping {} ({}), ignoring {} ({})",
                        emote.name,
                        existing.provider,
                        existing.url,
                        emote.provider,
                        emote.url
                    );
                }
                // 同一URL・同一提供元の重複は静かに無視する
            }
        }
    }

    if conflicts > 0 {
        log::warn!("Emote merge finished with {} name conflicts", conflicts);
    }

    EmoteCatalog::from_map(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotes::types::EmoteProvider;
    use chrono::Utc;

    fn emote(name: &str, url: &str, provider: EmoteProvider) -> Emote {
        Emote {
            id: format!("id-{}", name),
            name: name.to_string(),
            url: url.to_string(),
            provider,
            source: None,
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_first_provider_wins() {
        let catalog = merge_catalogs(vec![
            vec![emote("Kappa", "https://twitch.test/kappa", EmoteProvider::Twitch)],
            vec![emote("Kappa", "https://7tv.test/kappa", EmoteProvider::SevenTv)],
        ]);

        assert_eq!(catalog.len(), 1);
        let kept = catalog.get("Kappa").unwrap();
        assert_eq!(kept.provider, EmoteProvider::Twitch);
        assert_eq!(kept.url, "https://twitch.test/kappa");
    }

    #[test]
    fn test_merge_identical_duplicate_is_not_conflict() {
        // 同名・同URL・同提供元はただの重複（グローバルとチャンネルの
        // 両リストに同じエモートが載るケース）
        let catalog = merge_catalogs(vec![
            vec![emote("Kappa", "https://twitch.test/kappa", EmoteProvider::Twitch)],
            vec![emote("Kappa", "https://twitch.test/kappa", EmoteProvider::Twitch)],
        ]);

        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_merge_distinct_names_all_kept() {
        let catalog = merge_catalogs(vec![
            vec![emote("Kappa", "https://twitch.test/kappa", EmoteProvider::Twitch)],
            vec![emote("PogU", "https://7tv.test/pogu", EmoteProvider::SevenTv)],
            vec![emote("catJAM", "https://bttv.test/catjam", EmoteProvider::BetterTtv)],
            vec![emote("monkaS", "https://ffz.test/monkas", EmoteProvider::FrankerFaceZ)],
        ]);

        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_merge_empty_providers() {
        let catalog = merge_catalogs(vec![Vec::new(), Vec::new(), Vec::new(), Vec::new()]);
        assert!(catalog.is_empty());
    }

    fn aggregator_with_server(server: &mockito::ServerGuard) -> EmoteAggregator {
        let api = Arc::new(HelixClient::with_base_url(
            "test-token-1234567890".to_string(),
            "test-client-id".to_string(),
            server.url(),
        ));
        let providers =
            EmoteProviders::with_base_urls(server.url(), server.url(), server.url());
        EmoteAggregator::with_providers(api, providers)
    }

    /// 全サードパーティプロバイダーを404にし、Helixだけが応答する状態を作る
    async fn mock_channel(server: &mut mockito::ServerGuard) {
        server
            .mock("GET", "/users")
            .with_status(200)
            .with_body(r#"{"data":[{"id":"456","login":"me","display_name":"Me"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/users?login=somechannel")
            .with_status(200)
            .with_body(
                r#"{"data":[{"id":"123","login":"somechannel","display_name":"SomeChannel"}]}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/chat/emotes/user")
            .with_status(200)
            .with_body(r#"{"data":[],"template":"","pagination":{}}"#)
            .create_async()
            .await;
        for path in [
            "/emote-sets/global",
            "/users/twitch/123",
            "/cached/emotes/global",
            "/cached/users/twitch/123",
            "/set/global",
            "/room/id/123",
        ] {
            server.mock("GET", path).with_status(404).create_async().await;
        }
    }

    fn global_emotes_body(name: &str) -> String {
        format!(
            r#"{{"data":[{{"id":"25","name":"{}"}}],"template":"https://e.test/{{{{id}}}}/{{{{format}}}}/{{{{theme_mode}}}}/{{{{scale}}}}","pagination":{{}}}}"#,
            name
        )
    }

    #[tokio::test]
    async fn test_load_emotes_miss_blocks_then_hit_revalidates() {
        let mut server = mockito::Server::new_async().await;
        mock_channel(&mut server).await;
        server
            .mock("GET", "/chat/emotes/global")
            .with_status(200)
            .with_body(global_emotes_body("Kappa"))
            .create_async()
            .await;

        let aggregator = aggregator_with_server(&server);

        // ミス: 初回フェッチの完了までブロックし、完成したカタログを返す。
        // サードパーティ全滅（404）でも集約自体は失敗しない
        let catalog = aggregator.load_emotes("somechannel").await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("Kappa").is_some());

        // サーバー側のカタログが変わる（後から登録したモックが優先される）
        server
            .mock("GET", "/chat/emotes/global")
            .with_status(200)
            .with_body(global_emotes_body("PogChamp"))
            .create_async()
            .await;

        // ヒット: 古いカタログを即座に返す
        let stale = aggregator.load_emotes("somechannel").await.unwrap();
        assert!(stale.get("Kappa").is_some());

        // バックグラウンド再取得が丸ごと置き換えるのを待つ
        let mut refreshed = EmoteCatalog::empty();
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            refreshed = aggregator.load_emotes("somechannel").await.unwrap();
            if refreshed.get("PogChamp").is_some() {
                break;
            }
        }
        assert!(refreshed.get("PogChamp").is_some());
        // 置き換えは丸ごと。古いエントリは残らない
        assert!(refreshed.get("Kappa").is_none());
    }

    #[tokio::test]
    async fn test_single_background_refresh_per_channel() {
        let server = mockito::Server::new_async().await;
        let aggregator = aggregator_with_server(&server);

        assert!(aggregator.begin_refresh("somechannel").await);
        // 進行中のチャンネルは2件目を開始しない
        assert!(!aggregator.begin_refresh("somechannel").await);
        // 他のチャンネルには影響しない
        assert!(aggregator.begin_refresh("other").await);

        aggregator.end_refresh("somechannel").await;
        assert!(aggregator.begin_refresh("somechannel").await);
    }
}
