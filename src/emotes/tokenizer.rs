//! メッセージトークナイザー
//!
//! メッセージ本文をカタログと突き合わせ、テキスト断片と
//! エモート参照の列に分割する

use regex::Regex;
use std::sync::OnceLock;

use super::types::{Emote, EmoteCatalog};

// 空白正規化用正規表現のシングルトン（初回のみコンパイル）
static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_regex() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"))
}

/// トークン化されたメッセージの1断片
#[derive(Debug, Clone, PartialEq)]
pub enum MessageSegment {
    /// そのまま表示するテキスト（単語または区切りの空白1つ）
    Text(String),
    /// カタログで解決されたエモート
    Emote(Emote),
}

/// メッセージ本文をテキスト／エモートの断片列に分割
///
/// 連続する空白は1つに正規化し、前後の空白はトリムする。
/// カタログが空の場合は分割コストをかけず全文を1断片で返す
pub fn tokenize(text: &str, catalog: &EmoteCatalog) -> Vec<MessageSegment> {
    if catalog.is_empty() {
        return vec![MessageSegment::Text(text.to_string())];
    }

    let normalized = whitespace_regex().replace_all(text, " ");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    for (i, token) in normalized.split(' ').enumerate() {
        if i > 0 {
            segments.push(MessageSegment::Text(" ".to_string()));
        }
        match catalog.get(token) {
            Some(emote) => segments.push(MessageSegment::Emote(emote.clone())),
            None => segments.push(MessageSegment::Text(token.to_string())),
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotes::types::EmoteProvider;
    use chrono::Utc;
    use std::collections::HashMap;

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

    fn text(s: &str) -> MessageSegment {
        MessageSegment::Text(s.to_string())
    }

    #[test]
    fn test_tokenize_with_whitespace_normalization() {
        let catalog = catalog_with(&["Kappa", "PogChamp"]);
        let segments = tokenize("Kappa  Kappa PogChamp", &catalog);

        // 二重スペースは1つに正規化される
        assert_eq!(segments.len(), 5);
        assert!(matches!(&segments[0], MessageSegment::Emote(e) if e.name == "Kappa"));
        assert_eq!(segments[1], text(" "));
        assert!(matches!(&segments[2], MessageSegment::Emote(e) if e.name == "Kappa"));
        assert_eq!(segments[3], text(" "));
        assert!(matches!(&segments[4], MessageSegment::Emote(e) if e.name == "PogChamp"));
    }

    #[test]
    fn test_tokenize_mixed_text_and_emotes() {
        let catalog = catalog_with(&["Kappa"]);
        let segments = tokenize("hello Kappa world", &catalog);

        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], text("hello"));
        assert!(matches!(&segments[2], MessageSegment::Emote(e) if e.name == "Kappa"));
        assert_eq!(segments[4], text("world"));
    }

    #[test]
    fn test_tokenize_empty_catalog_fast_path() {
        let catalog = EmoteCatalog::empty();
        let segments = tokenize("Kappa  Kappa", &catalog);

        // 分割せず全文を1断片で返す
        assert_eq!(segments, vec![text("Kappa  Kappa")]);
    }

    #[test]
    fn test_tokenize_trims_and_handles_tabs() {
        let catalog = catalog_with(&["Kappa"]);
        let segments = tokenize("  \tKappa\n ", &catalog);

        assert_eq!(segments.len(), 1);
        assert!(matches!(&segments[0], MessageSegment::Emote(e) if e.name == "Kappa"));
    }

    #[test]
    fn test_tokenize_whitespace_only() {
        let catalog = catalog_with(&["Kappa"]);
        assert!(tokenize("   ", &catalog).is_empty());
    }

    #[test]
    fn test_emote_names_are_case_sensitive() {
        let catalog = catalog_with(&["Kappa"]);
        let segments = tokenize("kappa", &catalog);
        assert_eq!(segments, vec![text("kappa")]);
    }
}
