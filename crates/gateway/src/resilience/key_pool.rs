//! Round-robin API key rotation with per-key cooldown.
//!
//! One upstream account may be provisioned with several independently rate
//! limited keys. The pool hands them out in strict declared order. A key that
//! just produced a rate-limit error can be put in cooldown, and rotation then
//! skips it until the cooldown elapses. If every key is cooling down, plain
//! round-robin resumes.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::errors::GatewayError;

/// Longest cooldown applied to a key, whatever the configured value.
pub const MAX_KEY_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// A key handed out by the pool, with its position for cooldown reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiKey<'a> {
    pub index: usize,
    pub value: &'a str,
}

#[derive(Debug)]
struct RotationState {
    cursor: usize,
    cooling_until: Vec<Option<Instant>>,
}

/// Immutable list of credentials plus a moving cursor.
pub struct KeyPool {
    provider: &'static str,
    keys: Vec<String>,
    cooldown: Duration,
    state: Mutex<RotationState>,
}

impl KeyPool {
    /// Build a pool for `provider`.
    ///
    /// Blank entries are dropped. Returns a configuration error if no key
    /// remains, so a constructed pool is never empty. `cooldown` is capped at
    /// [`MAX_KEY_COOLDOWN`].
    pub fn new(
        provider: &'static str,
        keys: Vec<String>,
        cooldown: Duration,
    ) -> Result<Self, GatewayError> {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            return Err(GatewayError::Configuration(format!(
                "{} key pool needs at least one key",
                provider
            )));
        }

        let state = RotationState {
            cursor: 0,
            cooling_until: vec![None; keys.len()],
        };

        Ok(Self {
            provider,
            keys,
            cooldown: cooldown.min(MAX_KEY_COOLDOWN),
            state: Mutex::new(state),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, RotationState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("{} key pool mutex was poisoned, recovering", self.provider);
            poisoned.into_inner()
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Return the next usable key and advance the cursor past it.
    pub fn next_key(&self) -> ApiKey<'_> {
        let now = Instant::now();
        let count = self.keys.len();
        let mut state = self.lock_state();

        let start = state.cursor;
        let ready = (0..count)
            .map(|offset| (start + offset) % count)
            .find(|&i| state.cooling_until[i].map_or(true, |until| now >= until));

        let index = match ready {
            Some(index) => index,
            None => {
                debug!(
                    "{}: every key is cooling down, rotating regardless",
                    self.provider
                );
                start
            }
        };

        state.cursor = (index + 1) % count;
        ApiKey {
            index,
            value: &self.keys[index],
        }
    }

    /// Exclude the key at `index` from rotation for the configured cooldown.
    pub fn cool_down(&self, index: usize) {
        if index >= self.keys.len() {
            return;
        }
        let now = Instant::now();
        let until = now.checked_add(self.cooldown).unwrap_or(now);
        self.lock_state().cooling_until[index] = Some(until);
        warn!(
            "{}: key #{} rate limited, cooling down for {:?}",
            self.provider, index, self.cooldown
        );
    }

    /// Number of keys not currently cooling down.
    pub fn available(&self) -> usize {
        let now = Instant::now();
        self.lock_state()
            .cooling_until
            .iter()
            .filter(|until| until.map_or(true, |u| now >= u))
            .count()
    }
}
