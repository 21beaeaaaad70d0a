use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use poise::serenity_prelude::ChannelId;
use thiserror::Error;

const MAX_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);
const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limited by the upstream api")]
    RateLimited { retry_after: Option<Duration> },

    #[error("upstream api returned status {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Maps an HTTP 429 to [`FetchError::RateLimited`] (honoring `Retry-After`)
/// and any other non-success status to [`FetchError::Status`], so every
/// fetcher feeds the poller's backoff the same way.
pub fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = resp.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited {
            retry_after: parse_retry_after(resp.headers()),
        });
    }

    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    Ok(resp)
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// One external presence service. The poller only cares about turning a
/// batch of ids into the games each id is currently in.
#[async_trait]
pub trait PresenceFetcher: Send + Sync {
    /// Service name used in log lines.
    fn service(&self) -> &'static str;

    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, Vec<String>>, FetchError>;
}

#[derive(Default)]
struct PollState {
    // channel id -> external ids to keep polling for it
    poll_ids: HashMap<ChannelId, Vec<String>>,
    // external id -> games the id is currently in
    cache: HashMap<String, Vec<String>>,
    last_success: Option<Instant>,
}

/// Batched poller over an external presence API.
///
/// Channels register the ids they care about, a periodic task refreshes the
/// cache, and lookups never touch the network. Rate limits back off
/// (clearing the cache once it has gone stale), other errors retry a few
/// times and then keep the previous snapshot.
pub struct PresencePoller<F> {
    fetcher: F,
    stale_timeout: Duration,
    batch_size: usize,
    max_retries: u32,
    base_backoff: Duration,
    state: Mutex<PollState>,
}

impl<F: PresenceFetcher> PresencePoller<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            stale_timeout: Duration::from_secs(15 * 60),
            batch_size: 100,
            max_retries: 3,
            base_backoff: Duration::from_secs(2),
            state: Mutex::new(PollState::default()),
        }
    }

    pub fn with_stale_timeout(mut self, stale_timeout: Duration) -> Self {
        self.stale_timeout = stale_timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    /// Replaces the set of ids polled for a channel.
    pub fn set_poll(&self, channel_id: ChannelId, ids: Vec<String>) {
        let mut state = self.state.lock().unwrap();
        if ids.is_empty() {
            state.poll_ids.remove(&channel_id);
        } else {
            state.poll_ids.insert(channel_id, ids);
        }
    }

    pub fn remove_channel(&self, channel_id: ChannelId) {
        self.state.lock().unwrap().poll_ids.remove(&channel_id);
    }

    /// The cached games for an external id, if it was part of the last
    /// successful poll.
    pub fn games_for(&self, id: &str) -> Option<Vec<String>> {
        self.state.lock().unwrap().cache.get(id).cloned()
    }

    pub fn clear_cache(&self) {
        let mut state = self.state.lock().unwrap();
        state.cache.clear();
        state.last_success = None;
    }

    fn all_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .poll_ids
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    /// One poll cycle. An empty id set clears the cache and counts as
    /// success; otherwise the cache is replaced atomically once every batch
    /// came back.
    pub async fn poll_once(&self) -> Result<(), FetchError> {
        let ids = self.all_ids();

        if ids.is_empty() {
            if !self.state.lock().unwrap().cache.is_empty() {
                tracing::debug!(service = self.fetcher.service(), "no ids to poll, clearing cache");
            }
            self.clear_cache();
            return Ok(());
        }

        let mut new_cache = HashMap::new();
        for batch in ids.chunks(self.batch_size) {
            new_cache.extend(self.fetcher.fetch(batch).await?);
        }

        let mut state = self.state.lock().unwrap();
        state.cache = new_cache;
        state.last_success = Some(Instant::now());
        tracing::debug!(
            service = self.fetcher.service(),
            cached = state.cache.len(),
            polled = ids.len(),
            "poll finished"
        );
        Ok(())
    }

    /// A poll cycle wrapped in the retry policy. Never returns an error;
    /// after the retry budget is spent the previous cache stays in place
    /// until the next cycle.
    pub async fn poll_with_backoff(&self) {
        let mut retries = 0u32;

        loop {
            match self.poll_once().await {
                Ok(()) => return,

                Err(FetchError::RateLimited { retry_after }) => {
                    self.evict_if_stale();

                    let delay = retry_after
                        .unwrap_or_else(|| self.base_backoff * 2u32.saturating_pow(retries))
                        .min(MAX_RATE_LIMIT_BACKOFF);
                    tracing::debug!(
                        service = self.fetcher.service(),
                        delay = ?delay,
                        attempt = retries + 1,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }

                Err(e) => {
                    if retries >= self.max_retries {
                        tracing::error!(
                            service = self.fetcher.service(),
                            err = ?e,
                            "poll failed after retries, keeping old cache"
                        );
                        return;
                    }

                    let delay =
                        (self.base_backoff * 2u32.saturating_pow(retries)).min(MAX_ERROR_BACKOFF);
                    tracing::warn!(
                        service = self.fetcher.service(),
                        err = ?e,
                        delay = ?delay,
                        attempt = retries + 1,
                        "poll failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            retries += 1;
            if retries > self.max_retries {
                return;
            }
        }
    }

    /// While rate limited the cache keeps serving lookups, but only for so
    /// long: once older than the stale timeout it gets dropped rather than
    /// showing games nobody plays anymore.
    fn evict_if_stale(&self) {
        let mut state = self.state.lock().unwrap();

        let stale = state
            .last_success
            .is_none_or(|at| at.elapsed() > self.stale_timeout);

        if stale && !state.cache.is_empty() {
            tracing::warn!(
                service = self.fetcher.service(),
                "rate limited with a stale cache, clearing it"
            );
            state.cache.clear();
            state.last_success = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a script of responses and records every batch it was asked
    /// to fetch.
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<HashMap<String, Vec<String>>, FetchError>>>,
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedFetcher {
        fn new(
            script: impl IntoIterator<Item = Result<HashMap<String, Vec<String>>, FetchError>>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PresenceFetcher for ScriptedFetcher {
        fn service(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, Vec<String>>, FetchError> {
            self.batches.lock().unwrap().push(ids.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HashMap::new()))
        }
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn games_of(id: &str, game: &str) -> HashMap<String, Vec<String>> {
        HashMap::from([(id.to_string(), vec![game.to_string()])])
    }

    #[tokio::test]
    async fn successful_poll_fills_the_cache() {
        let poller = PresencePoller::new(ScriptedFetcher::new([Ok(games_of("1", "Factorio"))]));
        poller.set_poll(ChannelId::new(10), ids(&["1"]));

        poller.poll_once().await.unwrap();

        assert_eq!(poller.games_for("1"), Some(vec!["Factorio".to_string()]));
        assert_eq!(poller.games_for("2"), None);
    }

    #[tokio::test]
    async fn empty_id_set_clears_the_cache() {
        let poller = PresencePoller::new(ScriptedFetcher::new([Ok(games_of("1", "Factorio"))]));
        poller.set_poll(ChannelId::new(10), ids(&["1"]));
        poller.poll_once().await.unwrap();

        poller.set_poll(ChannelId::new(10), Vec::new());
        poller.poll_once().await.unwrap();

        assert_eq!(poller.games_for("1"), None);
    }

    #[tokio::test]
    async fn batches_respect_the_size_limit_and_keep_duplicates() {
        let fetcher = ScriptedFetcher::new([Ok(HashMap::new()), Ok(HashMap::new()), Ok(HashMap::new())]);
        let poller = PresencePoller::new(fetcher).with_batch_size(2);

        poller.set_poll(ChannelId::new(10), ids(&["1", "2", "1"]));
        poller.set_poll(ChannelId::new(20), ids(&["3", "4"]));

        poller.poll_once().await.unwrap();

        let batches = poller.fetcher.batches.lock().unwrap();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|batch| batch.len() <= 2));

        let mut polled: Vec<String> = batches.iter().flatten().cloned().collect();
        polled.sort();
        assert_eq!(polled, ids(&["1", "1", "2", "3", "4"]));
    }

    #[tokio::test]
    async fn failed_poll_keeps_the_previous_snapshot() {
        let poller = PresencePoller::new(ScriptedFetcher::new([
            Ok(games_of("1", "Factorio")),
            Err(FetchError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR)),
        ]))
        .with_max_retries(0);

        poller.set_poll(ChannelId::new(10), ids(&["1"]));
        poller.poll_with_backoff().await;
        poller.poll_with_backoff().await;

        assert_eq!(poller.games_for("1"), Some(vec!["Factorio".to_string()]));
    }

    #[tokio::test]
    async fn errors_are_retried_up_to_the_limit() {
        let fetcher = ScriptedFetcher::new([
            Err(FetchError::Status(reqwest::StatusCode::BAD_GATEWAY)),
            Err(FetchError::Status(reqwest::StatusCode::BAD_GATEWAY)),
            Ok(games_of("1", "Factorio")),
        ]);
        let poller = PresencePoller::new(fetcher)
            .with_max_retries(3)
            .with_base_backoff(Duration::from_millis(1));

        poller.set_poll(ChannelId::new(10), ids(&["1"]));
        poller.poll_with_backoff().await;

        assert_eq!(poller.games_for("1"), Some(vec!["Factorio".to_string()]));
        assert_eq!(poller.fetcher.batches.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rate_limit_with_fresh_cache_keeps_it() {
        let poller = PresencePoller::new(ScriptedFetcher::new([
            Ok(games_of("1", "Factorio")),
            Err(FetchError::RateLimited {
                retry_after: Some(Duration::from_millis(1)),
            }),
        ]))
        .with_max_retries(0);

        poller.set_poll(ChannelId::new(10), ids(&["1"]));
        poller.poll_with_backoff().await;
        poller.poll_with_backoff().await;

        assert_eq!(poller.games_for("1"), Some(vec!["Factorio".to_string()]));
    }

    #[tokio::test]
    async fn rate_limit_with_stale_cache_evicts_it() {
        let poller = PresencePoller::new(ScriptedFetcher::new([
            Ok(games_of("1", "Factorio")),
            Err(FetchError::RateLimited {
                retry_after: Some(Duration::from_millis(1)),
            }),
        ]))
        .with_max_retries(0)
        .with_stale_timeout(Duration::ZERO);

        poller.set_poll(ChannelId::new(10), ids(&["1"]));
        poller.poll_with_backoff().await;
        poller.poll_with_backoff().await;

        assert_eq!(poller.games_for("1"), None);
    }

    #[test]
    fn retry_after_header_parses_to_a_duration() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(reqwest::header::RETRY_AFTER, "nope".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);

        assert_eq!(parse_retry_after(&reqwest::header::HeaderMap::new()), None);
    }
}
