//! 📦 The RequestRecord: one request, frozen in amber.
//!
//! 🎬 *[a request walks in. it leaves. we write down what it looked like.]*
//!
//! Every request that passes through the interceptor becomes exactly one of these.
//! Built once, fully populated, then moved into the queue by value. Nobody mutates it
//! after that. Nobody *can*. It's owned by whoever holds it, and whoever holds it is
//! on their way to the sink. 🦆

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 🔢 What we write down when the client didn't bother to declare a body length.
pub const UNKNOWN_CONTENT_LENGTH: i64 = -1;

/// 📦 A snapshot of one observed request plus how long the downstream handler took.
///
/// Text fields that the client may omit (user agent, accept-language, referer,
/// content type) are empty strings when absent. Sinks decide whether empty means
/// NULL; see [`nullable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestRecord {
    /// 📡 Client address exactly as the host reported it. `ip:port`, usually.
    pub source_addr: String,
    pub user_agent: String,
    pub path: String,
    /// ⏱️ When processing began, before the downstream handler ran.
    pub observed_at: DateTime<Utc>,
    pub method: String,
    /// e.g. `HTTP/1.1`
    pub protocol: String,
    pub host: String,
    pub accept_language: String,
    pub referer: String,
    pub content_type: String,
    /// [`UNKNOWN_CONTENT_LENGTH`] when the request did not declare one.
    pub content_length: i64,
    /// ⏱️ Wall time from `observed_at` until the downstream handler returned.
    #[serde(serialize_with = "serialize_duration_micros")]
    pub duration: Duration,
}

impl RequestRecord {
    /// 🔢 Content length with the "unknown" sentinel folded into `None`.
    pub fn content_length_or_null(&self) -> Option<i64> {
        (self.content_length >= 0).then_some(self.content_length)
    }

    /// 📡 The client IP with any port stripped.
    ///
    /// Accepts `1.2.3.4`, `1.2.3.4:5678`, `::1` and `[::1]:5678`. Anything else
    /// (unix sockets, proxies that hand us garbage) comes back as `None`.
    pub fn source_ip(&self) -> Option<IpAddr> {
        let raw = self.source_addr.trim();
        if let Ok(socket) = raw.parse::<SocketAddr>() {
            return Some(socket.ip());
        }
        raw.trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .ok()
    }
}

/// 🕳️ Empty string in, `None` out. The NULL-shaped hole in every text column.
pub fn nullable(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn serialize_duration_micros<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    // -- 🔢 u128 micros is overkill for one request. u64 covers 584,000 years. we'll manage.
    serializer.serialize_u64(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}
