/// 重複メッセージ回避に使用する不可視文字
///
/// 同一テキストを連続送信するとTwitch側の重複防止で拒否されるため、
/// 2回目の送信時に末尾へ付加する
pub const INVISIBLE_SPACE: char = '\u{E0000}';

/// アクセストークンをマスキングしてログ出力用の文字列を生成
///
/// トークンの最初の4文字と最後の4文字のみを表示し、中間を***でマスキング
///
/// # Examples
/// ```
/// use twitch_emote_chat::util::mask_token;
///
/// let masked = mask_token("abcdef123456ghijkl789");
/// assert_eq!(masked, "abcd***l789");
/// ```
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "***".to_string();
    }

    let len = token.len();
    if len <= 8 {
        // 短いトークンは全体をマスク
        return "***".to_string();
    }

    let prefix = &token[..4];
    let suffix = &token[len - 4..];
    format!("{}***{}", prefix, suffix)
}

/// チャットメッセージから不可視文字を除去して前後の空白をトリム
pub fn clean_message(text: &str) -> String {
    text.replace(INVISIBLE_SPACE, "").trim().to_string()
}
