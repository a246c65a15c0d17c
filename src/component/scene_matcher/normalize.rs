//! 場景資料正規化

use regex::Regex;
use std::sync::LazyLock;

static REGEX_PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("Invalid regex"));

static REGEX_TAG_ILLEGAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9.]").expect("Invalid regex"));

static REGEX_FANSDB_STUDIO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^fansdb:\s*(.+?)\s*\((onlyfans|manyvids)\)\s*$").expect("Invalid regex")
});

/// `Big Tits (Natural)` → `big.tits`
#[must_use]
pub fn normalize_tag(tag: &str) -> Option<String> {
    let without_parens = REGEX_PARENTHESIZED.replace_all(tag, "");
    let dotted = without_parens.trim().replace(' ', ".");
    let cleaned = REGEX_TAG_ILLEGAL.replace_all(&dotted, "").to_lowercase();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// 去除重複，保留第一次出現的順序
#[must_use]
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().filter_map(|t| normalize_tag(t)) {
        if !result.contains(&tag) {
            result.push(tag);
        }
    }
    result
}

/// `FansDB: Jane (onlyfans)` → `OnlyFans-Jane`
#[must_use]
pub fn normalize_studio(studio: &str) -> String {
    let studio = studio.trim();
    let Some(caps) = REGEX_FANSDB_STUDIO.captures(studio) else {
        return studio.to_string();
    };
    let platform = if caps[2].eq_ignore_ascii_case("onlyfans") {
        "OnlyFans"
    } else {
        "ManyVids"
    };
    format!("{platform}-{}", &caps[1])
}

#[must_use]
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    trimmed
        .strip_suffix(" -")
        .unwrap_or(trimmed)
        .trim_end()
        .to_string()
}

/// 比較用：只保留英數字並轉小寫
#[must_use]
pub fn comparable(text: &str) -> String {
    text.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
