//! RFC 9110 HTTP-date parsing and formatting.
//!
//! Only the preferred `IMF-fixdate` format (`EEE, dd MMM yyyy HH:mm:ss GMT`)
//! is emitted, but `obs-date` variants accepted by [`httpdate`] are parsed
//! too, matching real-world client behavior for `If-Modified-Since` et al.

use std::fmt;
use std::time::SystemTime;

/// An HTTP-date, truncated to one-second resolution (RFC 9110 never
/// represents sub-second precision on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpDate(SystemTime);

/// Returned when a header value is not a valid HTTP-date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidHttpDate;

impl fmt::Display for InvalidHttpDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid HTTP-date")
    }
}

impl std::error::Error for InvalidHttpDate {}

impl HttpDate {
    /// Wrap a `SystemTime`, truncating to whole seconds.
    pub fn from_system_time(time: SystemTime) -> HttpDate {
        let secs = time
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        HttpDate(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }

    /// The current time, truncated to whole seconds.
    pub fn now() -> HttpDate {
        HttpDate::from_system_time(SystemTime::now())
    }

    /// Parse a `Last-Modified`/`If-Modified-Since`/`If-Unmodified-Since`
    /// style header value.
    pub fn parse(raw: &str) -> Result<HttpDate, InvalidHttpDate> {
        httpdate::parse_http_date(raw.trim())
            .map(HttpDate::from_system_time)
            .map_err(|_| InvalidHttpDate)
    }

    /// The underlying `SystemTime`.
    pub fn into_system_time(self) -> SystemTime {
        self.0
    }
}

impl fmt::Display for HttpDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&httpdate::fmt_http_date(self.0))
    }
}

impl From<SystemTime> for HttpDate {
    fn from(t: SystemTime) -> HttpDate {
        HttpDate::from_system_time(t)
    }
}

#[cfg(test)]
mod tests {
    use super::HttpDate;
    use std::time::{Duration, SystemTime};

    #[test]
    fn round_trip() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(784111777);
        let d = HttpDate::from_system_time(t);
        let formatted = d.to_string();
        assert_eq!(formatted, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(HttpDate::parse(&formatted).unwrap(), d);
    }

    #[test]
    fn obsolete_formats_still_parse() {
        // rfc850-date
        assert!(HttpDate::parse("Sunday, 06-Nov-94 08:49:37 GMT").is_ok());
        // asctime-date
        assert!(HttpDate::parse("Sun Nov  6 08:49:37 1994").is_ok());
    }

    #[test]
    fn invalid_is_rejected() {
        assert!(HttpDate::parse("not a date").is_err());
    }

    #[test]
    fn ordering_is_second_resolution() {
        let a = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(10));
        let b = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_millis(10_999));
        assert_eq!(a, b);
    }
}
