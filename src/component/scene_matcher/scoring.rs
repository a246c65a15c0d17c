use super::normalize::comparable;
use super::provider::SceneCandidate;
use crate::component::identity_resolver::{Identity, part_number_word};

const EXACT_DATE_SCORE: i32 = 100;
const NEAR_DATE_SCORE: i32 = 50;
const NEAR_DATE_PENALTY_PER_DAY: i32 = 10;
const STUDIO_SCORE: i32 = 30;
const PERFORMER_SCORE: i32 = 20;
const PART_SCORE: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub candidate: SceneCandidate,
    pub score: i32,
    /// 服務回傳的順序，從 0 開始
    pub rank: usize,
    /// 與檔名日期相差的天數
    pub date_distance: Option<i64>,
}

/// 計分並排序（分數高者在前，同分依服務排序）
///
/// `tolerance_days` 為 `Some` 時，日期相差超過容許範圍的候選會被排除。
#[must_use]
pub fn score_candidates(
    identity: &Identity,
    candidates: &[SceneCandidate],
    tolerance_days: Option<u32>,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .enumerate()
        .map(|(rank, candidate)| score_one(identity, candidate, rank))
        .filter(|scored| match (tolerance_days, identity.release_date) {
            (Some(tolerance), Some(_)) => scored
                .date_distance
                .is_some_and(|days| days <= i64::from(tolerance)),
            _ => true,
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score).then(a.rank.cmp(&b.rank)));
    scored
}

fn score_one(identity: &Identity, candidate: &SceneCandidate, rank: usize) -> ScoredCandidate {
    let mut score = 0;

    let date_distance = identity
        .release_date
        .zip(candidate.release_date)
        .map(|(wanted, actual)| (actual - wanted).num_days().abs());
    match date_distance {
        Some(0) => score += EXACT_DATE_SCORE,
        Some(days) => {
            let days = i32::try_from(days).unwrap_or(i32::MAX);
            score += NEAR_DATE_SCORE
                .saturating_sub(NEAR_DATE_PENALTY_PER_DAY.saturating_mul(days))
                .max(0);
        }
        None => {}
    }

    if let (Some(wanted), Some(actual)) = (&identity.studio, &candidate.studio)
        && comparable(wanted) == comparable(actual)
    {
        score += STUDIO_SCORE;
    }

    let candidate_performers: Vec<String> =
        candidate.performers.iter().map(|p| comparable(p)).collect();
    for performer in &identity.performers {
        if candidate_performers.contains(&comparable(&performer.full_name())) {
            score += PERFORMER_SCORE;
        }
    }

    if let Some(part) = identity.part
        && title_mentions_part(&candidate.title, part)
    {
        score += PART_SCORE;
    }

    ScoredCandidate {
        candidate: candidate.clone(),
        score,
        rank,
        date_distance,
    }
}

fn title_mentions_part(title: &str, part: u32) -> bool {
    let words: Vec<String> = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let number = part.to_string();
    let word = part_number_word(part);

    words.windows(2).any(|pair| {
        matches!(pair[0].as_str(), "part" | "pt")
            && (pair[1] == number || Some(pair[1].as_str()) == word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::identity_resolver::{Resolver, StrictFormatResolver};
    use chrono::NaiveDate;

    fn candidate(title: &str, studio: &str, date: (i32, u32, u32), performers: &[&str]) -> SceneCandidate {
        SceneCandidate {
            scene_id: title.to_string(),
            title: title.to_string(),
            studio: Some(studio.to_string()),
            release_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            performers: performers.iter().map(|p| (*p).to_string()).collect(),
            ..SceneCandidate::default()
        }
    }

    fn identity() -> Identity {
        StrictFormatResolver
            .resolve("Studio.24.01.02.Jane.Doe.Part.2.mp4")
            .unwrap()
    }

    #[test]
    fn test_exact_match_scores_all_signals() {
        let scored = score_candidates(
            &identity(),
            &[candidate("Pool Day Part 2", "Studio", (2024, 1, 2), &["Jane Doe"])],
            Some(6),
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].score, 100 + 30 + 20 + 10);
        assert_eq!(scored[0].date_distance, Some(0));
    }

    #[test]
    fn test_near_date_penalty_and_filter() {
        let candidates = [
            candidate("A", "Other", (2024, 1, 4), &[]),
            candidate("B", "Other", (2024, 1, 20), &[]),
        ];
        let scored = score_candidates(&identity(), &candidates, Some(6));
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].candidate.title, "A");
        assert_eq!(scored[0].score, 30);

        let unfiltered = score_candidates(&identity(), &candidates, None);
        assert_eq!(unfiltered.len(), 2);
        assert_eq!(unfiltered[1].score, 0);
    }

    #[test]
    fn test_ties_keep_provider_order() {
        let candidates = [
            candidate("First", "Studio", (2024, 1, 2), &[]),
            candidate("Second", "Studio", (2024, 1, 2), &[]),
            candidate("Best", "Studio", (2024, 1, 2), &["Jane Doe"]),
        ];
        let scored = score_candidates(&identity(), &candidates, Some(6));
        let titles: Vec<&str> = scored.iter().map(|s| s.candidate.title.as_str()).collect();
        assert_eq!(titles, vec!["Best", "First", "Second"]);
    }

    #[test]
    fn test_title_mentions_part() {
        assert!(title_mentions_part("Pool Day Part 2", 2));
        assert!(title_mentions_part("Pool Day - Pt. 2", 2));
        assert!(title_mentions_part("Pool Day Part Two", 2));
        assert!(!title_mentions_part("Pool Day Part 12", 2));
        assert!(!title_mentions_part("Pool Day", 2));
    }
}
