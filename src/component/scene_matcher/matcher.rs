use super::normalize::{normalize_studio, normalize_tags, normalize_title};
use super::provider::{MetadataProvider, ProviderError, SceneCandidate};
use super::scoring::{ScoredCandidate, score_candidates};
use crate::component::identity_resolver::Identity;
use crate::component::operator::Operator;
use crate::config::{AmbiguityPolicy, MatcherSettings, RetrySettings};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// 等待時每次檢查中斷信號的間隔
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// 比對成功的場景資料
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SceneRecord {
    pub scene_id: String,
    pub title: String,
    pub studio: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub performers: Vec<String>,
    pub tags: Vec<String>,
    pub description: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub duration_seconds: Option<u64>,
}

impl From<SceneCandidate> for SceneRecord {
    fn from(candidate: SceneCandidate) -> Self {
        Self {
            tags: normalize_tags(&candidate.tags),
            scene_id: candidate.scene_id,
            title: normalize_title(&candidate.title),
            studio: candidate.studio.as_deref().map(normalize_studio),
            release_date: candidate.release_date,
            performers: candidate.performers,
            description: candidate.description.unwrap_or_default().trim().to_string(),
            url: candidate.url,
            image_url: candidate.image_url,
            duration_seconds: candidate.duration_seconds,
        }
    }
}

/// 長度差距超過 60 秒且超過 10% 才視為不符
const DURATION_TOLERANCE_SECONDS: f64 = 60.0;
const DURATION_TOLERANCE_RATIO: f64 = 0.1;

impl SceneRecord {
    /// 與實際影片長度差距過大時回傳差距秒數，可能代表比對到錯的場景
    #[must_use]
    pub fn duration_mismatch(&self, actual_seconds: f64) -> Option<f64> {
        let expected = self.duration_seconds? as f64;
        let difference = (expected - actual_seconds).abs();
        (difference > DURATION_TOLERANCE_SECONDS
            && difference > expected * DURATION_TOLERANCE_RATIO)
            .then_some(difference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("找不到符合的場景: {query}")]
    NoMatchFound { query: String },
    #[error("中繼資料服務無法使用: {reason}")]
    MatchServiceUnavailable { reason: String },
    #[error("比對已中斷")]
    Cancelled,
}

pub struct SceneMatcher {
    provider: Box<dyn MetadataProvider>,
    ambiguity: AmbiguityPolicy,
    date_tolerance_days: u32,
    retry: RetrySettings,
    shutdown_signal: Arc<AtomicBool>,
}

impl SceneMatcher {
    #[must_use]
    pub fn new(
        provider: Box<dyn MetadataProvider>,
        settings: &MatcherSettings,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            provider,
            ambiguity: settings.ambiguity,
            date_tolerance_days: settings.date_tolerance_days,
            retry: settings.retry.clone(),
            shutdown_signal,
        }
    }

    /// 依序嘗試備用搜尋字串，直到有可接受的候選
    pub fn find_scene(
        &self,
        identity: &Identity,
        operator: &dyn Operator,
    ) -> Result<SceneRecord, MatchError> {
        for query in identity.fallback_queries() {
            let candidates = self.search_with_retry(&query)?;
            if candidates.is_empty() {
                debug!("{} 沒有結果: {query}", self.provider.name());
                continue;
            }

            if let Some(record) = self.select(identity, &query, &candidates, operator)? {
                info!("比對成功: {} ({})", record.title, record.scene_id);
                return Ok(record);
            }
        }

        Err(MatchError::NoMatchFound {
            query: identity.query.clone(),
        })
    }

    /// `Ok(None)` 代表這個搜尋字串沒有可接受的候選，繼續下一個
    fn select(
        &self,
        identity: &Identity,
        query: &str,
        candidates: &[SceneCandidate],
        operator: &dyn Operator,
    ) -> Result<Option<SceneRecord>, MatchError> {
        let within_tolerance =
            score_candidates(identity, candidates, Some(self.date_tolerance_days));

        match self.ambiguity {
            AmbiguityPolicy::BestScore => Ok(within_tolerance
                .into_iter()
                .next()
                .map(|best| SceneRecord::from(best.candidate))),
            AmbiguityPolicy::AskUser => {
                if let [only] = within_tolerance.as_slice() {
                    return Ok(Some(SceneRecord::from(only.candidate.clone())));
                }

                // 日期全部不符時仍讓操作者從完整清單挑選
                let offered: Vec<ScoredCandidate> = if within_tolerance.is_empty() {
                    score_candidates(identity, candidates, None)
                } else {
                    within_tolerance
                };

                match operator.choose_scene(query, &offered) {
                    Ok(Some(index)) => offered
                        .into_iter()
                        .nth(index)
                        .map(|chosen| Some(SceneRecord::from(chosen.candidate)))
                        .ok_or_else(|| MatchError::NoMatchFound {
                            query: query.to_string(),
                        }),
                    Ok(None) => Err(MatchError::NoMatchFound {
                        query: query.to_string(),
                    }),
                    Err(e) => {
                        warn!("無法詢問操作者，視為沒有符合的場景: {e:#}");
                        Err(MatchError::NoMatchFound {
                            query: query.to_string(),
                        })
                    }
                }
            }
        }
    }

    fn search_with_retry(&self, query: &str) -> Result<Vec<SceneCandidate>, MatchError> {
        let mut failures = 0u32;
        let mut rate_limit_waits = 0u32;

        loop {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                return Err(MatchError::Cancelled);
            }

            match self.provider.search_scenes(query) {
                Ok(candidates) => return Ok(candidates),
                Err(ProviderError::RateLimited { retry_after }) => {
                    rate_limit_waits += 1;
                    if rate_limit_waits > self.retry.max_rate_limit_waits {
                        return Err(MatchError::MatchServiceUnavailable {
                            reason: format!("連續 {rate_limit_waits} 次被限流"),
                        });
                    }
                    let wait = retry_after
                        .unwrap_or_else(|| self.backoff(rate_limit_waits))
                        .min(Duration::from_millis(self.retry.max_delay_ms));
                    warn!("{} 限流，{wait:?} 後重試", self.provider.name());
                    self.sleep(wait)?;
                }
                Err(ProviderError::Transient(reason)) => {
                    failures += 1;
                    if failures >= self.retry.max_attempts {
                        return Err(MatchError::MatchServiceUnavailable { reason });
                    }
                    let wait = self.backoff(failures);
                    warn!(
                        "{} 暫時無法使用 ({failures}/{}): {reason}，{wait:?} 後重試",
                        self.provider.name(),
                        self.retry.max_attempts
                    );
                    self.sleep(wait)?;
                }
                Err(ProviderError::Rejected(reason)) => {
                    return Err(MatchError::MatchServiceUnavailable { reason });
                }
            }
        }
    }

    /// `base * 2^(n-1)`，上限 `max_delay`
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.retry.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.retry.max_delay_ms))
    }

    fn sleep(&self, total: Duration) -> Result<(), MatchError> {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                return Err(MatchError::Cancelled);
            }
            let step = remaining.min(SLEEP_SLICE);
            thread::sleep(step);
            remaining -= step;
        }
        Ok(())
    }
}
