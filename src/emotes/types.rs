use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// エモートの提供元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmoteProvider {
    #[serde(rename = "twitch")]
    Twitch,
    #[serde(rename = "7tv")]
    SevenTv,
    #[serde(rename = "bttv")]
    BetterTtv,
    #[serde(rename = "ffz")]
    FrankerFaceZ,
}

impl std::fmt::Display for EmoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Twitch => "twitch",
            Self::SevenTv => "7tv",
            Self::BetterTtv => "bttv",
            Self::FrankerFaceZ => "ffz",
        };
        write!(f, "{}", name)
    }
}

/// エモート
///
/// 提供元とresolved_atは名前衝突時の診断用に保持する
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emote {
    pub id: String,
    pub name: String,
    pub url: String,
    pub provider: EmoteProvider,
    /// "Global" / "Channel" / "Shared" などの由来ラベル
    pub source: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// チャンネル単位のマージ済みエモートカタログ
///
/// 名前をキーとするマップ。常に丸ごと置き換えられ、
/// 部分的に更新されることはない
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmoteCatalog {
    emotes: HashMap<String, Emote>,
    pub populated_at: DateTime<Utc>,
}

impl EmoteCatalog {
    /// 空のカタログを作成
    pub fn empty() -> Self {
        Self {
            emotes: HashMap::new(),
            populated_at: Utc::now(),
        }
    }

    pub(crate) fn from_map(emotes: HashMap<String, Emote>) -> Self {
        Self {
            emotes,
            populated_at: Utc::now(),
        }
    }

    /// 名前でエモートを検索
    pub fn get(&self, name: &str) -> Option<&Emote> {
        self.emotes.get(name)
    }

    pub fn len(&self) -> usize {
        self.emotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emotes.is_empty()
    }

    /// 全エモートを列挙（順序は不定）
    pub fn iter(&self) -> impl Iterator<Item = &Emote> {
        self.emotes.values()
    }
}

// 7TV API レスポンス型

#[derive(Debug, Deserialize)]
pub struct SevenTvUserResponse {
    pub emote_set: Option<SevenTvEmoteSet>,
}

#[derive(Debug, Deserialize)]
pub struct SevenTvEmoteSet {
    #[serde(default)]
    pub emotes: Vec<SevenTvEmote>,
}

#[derive(Debug, Deserialize)]
pub struct SevenTvEmote {
    pub id: String,
    pub name: String,
}

// BetterTTV API レスポンス型

#[derive(Debug, Deserialize)]
pub struct BttvEmote {
    pub id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BttvUserResponse {
    #[serde(default)]
    pub channel_emotes: Vec<BttvEmote>,
    #[serde(default)]
    pub shared_emotes: Vec<BttvEmote>,
}

// FrankerFaceZ API レスポンス型

#[derive(Debug, Deserialize)]
pub struct FfzSetsResponse {
    /// セットID → セット。複数の名前付きセットに分かれている
    #[serde(default)]
    pub sets: HashMap<String, FfzSet>,
}

#[derive(Debug, Deserialize)]
pub struct FfzSet {
    #[serde(default)]
    pub emoticons: Vec<FfzEmoticon>,
}

#[derive(Debug, Deserialize)]
pub struct FfzEmoticon {
    pub id: u64,
    pub name: String,
    /// スケール → URL（プロトコル相対の場合がある）
    #[serde(default)]
    pub urls: HashMap<String, String>,
}
