use chrono::{Datelike, NaiveDate};
use std::fmt;

/// 發佈版本標記，出現在檔名中的獨立 token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReleaseFlag {
    Vr2Normal,
    Bts,
    Upscaled,
    Vertical,
    Pov,
    Trailer,
}

impl ReleaseFlag {
    /// 依優先順序排列，標題後綴取第一個
    pub const PRIORITY: [Self; 6] = [
        Self::Vr2Normal,
        Self::Bts,
        Self::Upscaled,
        Self::Vertical,
        Self::Pov,
        Self::Trailer,
    ];

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|flag| flag.token().eq_ignore_ascii_case(token))
    }

    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Vr2Normal => "vr2normal",
            Self::Bts => "bts",
            Self::Upscaled => "upscaled",
            Self::Vertical => "vertical",
            Self::Pov => "pov",
            Self::Trailer => "trailer",
        }
    }

    #[must_use]
    pub const fn release_suffix(self) -> &'static str {
        match self {
            Self::Vr2Normal => "VR2Normal",
            Self::Bts => "BTS",
            Self::Upscaled => "Upscaled",
            Self::Vertical => "Vertical",
            Self::Pov => "POV",
            Self::Trailer => "Trailer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Performer {
    pub first: String,
    pub last: String,
}

impl Performer {
    #[must_use]
    pub fn new(first: &str, last: &str) -> Self {
        Self {
            first: first.to_string(),
            last: last.to_string(),
        }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first, self.last)
    }
}

impl fmt::Display for Performer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first, self.last)
    }
}

/// 解析後的身分，建立後不再修改
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub studio: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub performers: Vec<Performer>,
    pub part: Option<u32>,
    pub flags: Vec<ReleaseFlag>,
    /// 送往中繼資料服務的搜尋字串
    pub query: String,
}

const PART_WORDS: [&str; 20] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
    "twenty",
];

/// 1..=20 的英文數字
#[must_use]
pub fn part_number_word(part: u32) -> Option<&'static str> {
    let index = usize::try_from(part).ok()?.checked_sub(1)?;
    PART_WORDS.get(index).copied()
}

impl Identity {
    /// 嚴格格式的標準名稱：`Studio.YY.MM.DD.First.Last[.and.First.Last][.Part.N]`
    ///
    /// 自由文字模式沒有結構化欄位，直接回傳搜尋字串。
    #[must_use]
    pub fn canonical_name(&self) -> String {
        self.dotted_name(true, self.part.map(|p| p.to_string()))
    }

    /// 依序嘗試的搜尋字串，去除重複
    #[must_use]
    pub fn fallback_queries(&self) -> Vec<String> {
        if self.studio.is_none() || self.release_date.is_none() {
            return vec![self.query.clone()];
        }

        let mut queries = vec![self.canonical_name()];
        if let Some(word) = self.part.and_then(part_number_word) {
            queries.push(self.dotted_name(true, Some(word.to_string())));
        }
        queries.push(self.dotted_name(false, self.part.map(|p| p.to_string())));
        queries.dedup();
        queries
    }

    /// 第一個（依優先順序）發佈標記對應的標題後綴
    #[must_use]
    pub fn release_suffix(&self) -> Option<&'static str> {
        ReleaseFlag::PRIORITY
            .into_iter()
            .find(|flag| self.flags.contains(flag))
            .map(ReleaseFlag::release_suffix)
    }

    fn dotted_name(&self, with_date: bool, part: Option<String>) -> String {
        let Some(studio) = &self.studio else {
            return self.query.clone();
        };

        let mut segments = vec![studio.clone()];
        if with_date && let Some(date) = self.release_date {
            segments.push(format!(
                "{:02}.{:02}.{:02}",
                date.year() % 100,
                date.month(),
                date.day()
            ));
        }
        for (i, performer) in self.performers.iter().enumerate() {
            if i > 0 {
                segments.push("and".to_string());
            }
            segments.push(format!("{}.{}", performer.first, performer.last));
        }
        if let Some(part) = part {
            segments.push(format!("Part.{part}"));
        }
        segments.join(".")
    }
}
