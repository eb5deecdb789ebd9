use std::sync::Arc;

use tracing::{debug, warn};

use super::store::{KeyValueStore, MemoryStore};
use crate::models::Level;

/// Storage key for the difficulty level.
pub const LEVEL_KEY: &str = "difficulty";

/// Storage key for the playback speed.
pub const SPEED_KEY: &str = "speed";

pub const DEFAULT_SPEED: f64 = 1.0;
pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;

/// Validated access to the persisted level and speed.
///
/// Clone is cheap; clones share the underlying store.
#[derive(Clone)]
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn level(&self) -> Level {
        parse_level(self.store.get(LEVEL_KEY).as_deref())
    }

    pub fn set_level(&self, level: Level) {
        self.write(LEVEL_KEY, &level.number().to_string());
    }

    pub fn speed(&self) -> f64 {
        parse_speed(self.store.get(SPEED_KEY).as_deref())
    }

    pub fn set_speed(&self, speed: f64) {
        self.write(SPEED_KEY, &speed.to_string());
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key, error = %e, "Failed to persist preference");
        }
    }
}

/// Interpret a stored level. Unparseable or missing values mean level 1;
/// parsed values are clamped into 1..=3.
pub fn parse_level(raw: Option<&str>) -> Level {
    match raw.and_then(leading_int) {
        Some(n) => Level::clamped(n),
        None => {
            if let Some(raw) = raw {
                debug!(value = raw, "Ignoring malformed stored level");
            }
            Level::One
        }
    }
}

/// Interpret a stored speed. Unparseable or missing values mean 1.0;
/// parsed values are clamped into [0.5, 2.0].
pub fn parse_speed(raw: Option<&str>) -> f64 {
    match raw.and_then(leading_float) {
        Some(speed) => clamp_speed(speed),
        None => {
            if let Some(raw) = raw {
                debug!(value = raw, "Ignoring malformed stored speed");
            }
            DEFAULT_SPEED
        }
    }
}

pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        return DEFAULT_SPEED;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

/// Parse the integer prefix of `raw` ("2", " 3 ", "2.7" and "1e3" all parse).
fn leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let negative = bytes.first() == Some(&b'-');
    let start = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let end = start
        + bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
    if end == start {
        return None;
    }
    match s[..end].parse::<i64>() {
        Ok(n) => Some(n),
        // Only overflow is possible here; saturate in the right direction.
        Err(_) if negative => Some(i64::MIN),
        Err(_) => Some(i64::MAX),
    }
}

/// Parse the decimal prefix of `raw` ("1.25", "1.5x", ".75" and "Infinity" all parse).
fn leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let negative = bytes.first() == Some(&b'-');
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    if s[end..].starts_with("Infinity") {
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let int_digits = digits(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = digits(exp_end);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse().ok()
}
