//! Request signing.
//!
//! A signature is the lowercase hex MD5 of
//! `device_id ++ api_key ++ api_secret ++ path ++ t`, where `t` is the
//! decimal timestamp sent alongside it. The service verifies the same
//! concatenation, so the algorithm and field names are wire format: MD5 here
//! is for compatibility, not strength.
//!
//! Timestamps are ticks (100 ns units since 0001-01-01T00:00:00 UTC). A
//! `TickClock` never hands out the same tick twice, so a signature is never
//! reused even when two requests are signed within the same tick.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};

/// Ticks between 0001-01-01 and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Stable per-installation identifier supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A computed signature and the timestamp it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub value: String,
    pub timestamp: i64,
}

impl Signature {
    /// The `signature` and `t` form fields, in that order.
    pub fn into_fields(self) -> [(String, String); 2] {
        [
            ("signature".to_string(), self.value),
            ("t".to_string(), self.timestamp.to_string()),
        ]
    }
}

/// Strictly increasing tick source.
#[derive(Debug, Default)]
pub struct TickClock {
    last: AtomicI64,
}

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock ticks, without the uniqueness guarantee.
    pub fn now_ticks() -> i64 {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos() / 100).unwrap_or(i64::MAX - UNIX_EPOCH_TICKS))
            .unwrap_or(0);
        UNIX_EPOCH_TICKS + since_epoch
    }

    /// The next tick: the current time, or one past the last tick issued if
    /// the clock has not moved on.
    pub fn next(&self) -> i64 {
        let now = Self::now_ticks();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = if now > last { now } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

/// Compute the signature for a path at a given timestamp.
pub fn sign_at(
    path: &str,
    api_key: &str,
    api_secret: &str,
    device_id: &DeviceId,
    timestamp: i64,
) -> Signature {
    let raw = format!("{device_id}{api_key}{api_secret}{path}{timestamp}");
    let digest = Md5::digest(ascii_bytes(&raw));
    Signature {
        value: hex::encode(digest),
        timestamp,
    }
}

/// ASCII encoding of `raw`: characters outside ASCII become `?`, one per
/// UTF-16 code unit.
fn ascii_bytes(raw: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            bytes.push(c as u8);
        } else {
            bytes.extend(std::iter::repeat(b'?').take(c.len_utf16()));
        }
    }
    bytes
}

/// Signs requests for one device with fresh timestamps.
#[derive(Debug)]
pub struct Signer {
    device_id: DeviceId,
    clock: TickClock,
}

impl Signer {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            clock: TickClock::new(),
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn sign(&self, path: &str, api_key: &str, api_secret: &str) -> Signature {
        sign_at(path, api_key, api_secret, &self.device_id, self.clock.next())
    }
}
