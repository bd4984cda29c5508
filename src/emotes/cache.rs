// =============================================================================
// エモートカタログキャッシュ
// =============================================================================
// チャンネル単位でマージ済みカタログを保持する。
// 更新は常に丸ごと置き換えで行い、読み手が中途半端な
// カタログを観測することはない
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::EmoteCatalog;

/// チャンネル別エモートカタログキャッシュ
#[derive(Debug, Default)]
pub struct EmoteCache {
    /// チャンネルログイン名 → カタログ
    entries: Arc<RwLock<HashMap<String, EmoteCatalog>>>,
}

impl EmoteCache {
    /// 新しいキャッシュを作成
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// チャンネルのカタログを取得（なければNone）
    pub async fn get(&self, channel: &str) -> Option<EmoteCatalog> {
        let entries = self.entries.read().await;
        let catalog = entries.get(channel).cloned();

        if let Some(catalog) = &catalog {
            log::debug!(
                "Emote cache hit for {} ({} emotes, populated at {})",
                channel,
                catalog.len(),
                catalog.populated_at
            );
        }

        catalog
    }

    /// チャンネルのカタログを丸ごと置き換え
    pub async fn replace(&self, channel: &str, catalog: EmoteCatalog) {
        let mut entries = self.entries.write().await;
        log::info!(
            "Emote catalog for {} replaced ({} emotes)",
            channel,
            catalog.len()
        );
        entries.insert(channel.to_string(), catalog);
    }

    /// 特定チャンネルのエントリを破棄
    pub async fn invalidate(&self, channel: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(channel).is_some() {
            log::info!("Emote cache invalidated for {}", channel);
        }
    }

    /// 全エントリを破棄
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        log::info!("Emote cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotes::types::{Emote, EmoteProvider};
    use chrono::Utc;

    fn catalog_with(names: &[&str]) -> EmoteCatalog {
        let mut map = HashMap::new();
        for name in names {
            map.insert(
                name.to_string(),
                Emote {
                    id: format!("id-{}", name),
                    name: name.to_string(),
                    url: format!("https://example.test/{}", name),
                    provider: EmoteProvider::Twitch,
                    source: None,
                    resolved_at: Utc::now(),
                },
            );
        }
        EmoteCatalog::from_map(map)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = EmoteCache::new();
        assert!(cache.get("somechannel").await.is_none());

        cache.replace("somechannel", catalog_with(&["Kappa"])).await;

        let catalog = cache.get("somechannel").await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("Kappa").is_some());
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let cache = EmoteCache::new();
        cache
            .replace("somechannel", catalog_with(&["Kappa", "PogChamp"]))
            .await;
        cache.replace("somechannel", catalog_with(&["LUL"])).await;

        // 古いエントリは一切残らない
        let catalog = cache.get("somechannel").await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("Kappa").is_none());
        assert!(catalog.get("LUL").is_some());
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let cache = EmoteCache::new();
        cache.replace("alpha", catalog_with(&["Kappa"])).await;
        cache.replace("beta", catalog_with(&["LUL"])).await;

        cache.invalidate("alpha").await;

        assert!(cache.get("alpha").await.is_none());
        assert!(cache.get("beta").await.is_some());
    }
}
