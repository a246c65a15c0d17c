//! 均勻時間點選取
//!
//! 縮圖表與動態預覽都以影片長度為基準，在去除前後邊界後均勻取樣。

/// 在 `[start_margin, 1 - end_margin]` 範圍內均勻取 `count` 個時間點
///
/// 每個時段取中間位置：`start + span * (i + 0.5) / count`
#[must_use]
pub fn select_uniform_timestamps(
    duration: f64,
    count: usize,
    start_margin: f64,
    end_margin: f64,
) -> Vec<f64> {
    let Some((start, span)) = effective_range(duration, start_margin, end_margin) else {
        return Vec::new();
    };
    if count == 0 {
        return Vec::new();
    }

    (0..count)
        .map(|i| {
            let ratio = (i as f64 + 0.5) / count as f64;
            (start + span * ratio).clamp(0.0, duration)
        })
        .collect()
}

/// 在間隔至少 `min_gap` 秒的前提下，可容納的最大取樣數
#[must_use]
pub fn max_sample_count(duration: f64, start_margin: f64, end_margin: f64, min_gap: f64) -> usize {
    let Some((_, span)) = effective_range(duration, start_margin, end_margin) else {
        return 0;
    };
    if min_gap <= 0.0 {
        return usize::MAX;
    }
    (span / min_gap).floor() as usize
}

fn effective_range(duration: f64, start_margin: f64, end_margin: f64) -> Option<(f64, f64)> {
    if duration <= 0.0 {
        return None;
    }
    let start = duration * start_margin;
    let end = duration * (1.0 - end_margin);
    let span = end - start;
    (span > 0.0).then_some((start, span))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSlot {
    pub start: f64,
    pub length: f64,
}

impl ClipSlot {
    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.length
    }
}

/// 選取不重疊的預覽片段
///
/// 可用範圍為 `[duration * start_margin, duration - end_safety]`，平均切成
/// `count` 個時段，每段置中放一個 `clip_len` 長的片段。範圍不夠時減少片段數，
/// 連一段都放不下則回傳空陣列。
#[must_use]
pub fn select_clip_slots(
    duration: f64,
    count: usize,
    clip_len: f64,
    start_margin: f64,
    end_safety: f64,
) -> Vec<ClipSlot> {
    if duration <= 0.0 || count == 0 || clip_len <= 0.0 {
        return Vec::new();
    }

    let usable_start = duration * start_margin;
    let usable_end = duration - end_safety;
    let span = usable_end - usable_start;
    if span < clip_len {
        return Vec::new();
    }

    let fit = ((span / clip_len).floor() as usize).min(count);
    let slot = span / fit as f64;

    (0..fit)
        .map(|k| {
            let start = usable_start + k as f64 * slot + (slot - clip_len) / 2.0;
            let length = clip_len.min(usable_end - start);
            ClipSlot { start, length }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_timestamps_distribution() {
        let timestamps = select_uniform_timestamps(100.0, 5, 0.02, 0.02);

        // 有效範圍 2.0 ~ 98.0
        assert_eq!(timestamps.len(), 5);
        assert!((timestamps[0] - 11.6).abs() < 0.1);
        assert!((timestamps[2] - 50.0).abs() < 0.1);
        assert!((timestamps[4] - 88.4).abs() < 0.1);
    }

    #[test]
    fn test_uniform_timestamps_strictly_increasing() {
        let timestamps = select_uniform_timestamps(3600.0, 30, 0.02, 0.02);
        assert_eq!(timestamps.len(), 30);
        assert!(timestamps.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_uniform_timestamps_edge_cases() {
        assert!(select_uniform_timestamps(0.0, 10, 0.02, 0.02).is_empty());
        assert!(select_uniform_timestamps(100.0, 0, 0.02, 0.02).is_empty());
        assert!(select_uniform_timestamps(100.0, 10, 0.6, 0.6).is_empty());
    }

    #[test]
    fn test_max_sample_count() {
        // 有效範圍 96 秒
        assert_eq!(max_sample_count(100.0, 0.02, 0.02, 1.0), 96);
        assert_eq!(max_sample_count(10.0, 0.0, 0.0, 3.0), 3);
        assert_eq!(max_sample_count(0.0, 0.0, 0.0, 1.0), 0);
    }

    #[test]
    fn test_clip_slots_do_not_overlap() {
        let slots = select_clip_slots(600.0, 8, 2.0, 0.05, 3.0);
        assert_eq!(slots.len(), 8);
        assert!(slots.windows(2).all(|w| w[0].end() <= w[1].start));
        assert!(slots[0].start >= 30.0);
        assert!(slots[7].end() <= 597.0);
    }

    #[test]
    fn test_clip_slots_reduced_for_short_source() {
        // 可用範圍 10 - 3 = 7 秒，只放得下 3 段 2 秒
        let slots = select_clip_slots(10.0, 8, 2.0, 0.0, 3.0);
        assert_eq!(slots.len(), 3);
        assert!(slots.last().unwrap().end() <= 7.0 + f64::EPSILON);
    }

    #[test]
    fn test_clip_slots_empty_when_nothing_fits() {
        assert!(select_clip_slots(4.0, 8, 2.0, 0.0, 3.0).is_empty());
        assert!(select_clip_slots(100.0, 0, 2.0, 0.0, 3.0).is_empty());
    }
}
