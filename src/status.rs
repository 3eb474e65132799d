//! HTTP status codes.

use std::cmp::Ordering;
use std::fmt;

/// An HTTP status code (`status-code` in RFC 9110 §15).
///
/// Covers the IANA-registered status codes plus a `Raw` escape hatch for
/// anything else. If you encounter a status code you don't recognize,
/// treat it as the `x00` status of its class — `self.class().default_code()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 100 Continue
    Continue,
    /// 101 Switching Protocols
    SwitchingProtocols,
    /// 102 Processing
    Processing,

    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 202 Accepted
    Accepted,
    /// 203 Non-Authoritative Information
    NonAuthoritativeInformation,
    /// 204 No Content
    NoContent,
    /// 205 Reset Content
    ResetContent,
    /// 206 Partial Content
    PartialContent,
    /// 207 Multi-Status
    MultiStatus,
    /// 208 Already Reported
    AlreadyReported,
    /// 226 IM Used
    ImUsed,

    /// 300 Multiple Choices
    MultipleChoices,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 302 Found
    Found,
    /// 303 See Other
    SeeOther,
    /// 304 Not Modified
    NotModified,
    /// 305 Use Proxy
    UseProxy,
    /// 307 Temporary Redirect
    TemporaryRedirect,
    /// 308 Permanent Redirect
    PermanentRedirect,

    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 402 Payment Required
    PaymentRequired,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 406 Not Acceptable
    NotAcceptable,
    /// 407 Proxy Authentication Required
    ProxyAuthenticationRequired,
    /// 408 Request Timeout
    RequestTimeout,
    /// 409 Conflict
    Conflict,
    /// 410 Gone
    Gone,
    /// 411 Length Required
    LengthRequired,
    /// 412 Precondition Failed
    PreconditionFailed,
    /// 413 Content Too Large
    PayloadTooLarge,
    /// 414 URI Too Long
    UriTooLong,
    /// 415 Unsupported Media Type
    UnsupportedMediaType,
    /// 416 Range Not Satisfiable
    RangeNotSatisfiable,
    /// 417 Expectation Failed
    ExpectationFailed,
    /// 418 I'm a teapot
    ImATeapot,
    /// 421 Misdirected Request
    MisdirectedRequest,
    /// 422 Unprocessable Content
    UnprocessableEntity,
    /// 423 Locked
    Locked,
    /// 424 Failed Dependency
    FailedDependency,
    /// 425 Too Early
    TooEarly,
    /// 426 Upgrade Required
    UpgradeRequired,
    /// 428 Precondition Required
    PreconditionRequired,
    /// 429 Too Many Requests
    TooManyRequests,
    /// 431 Request Header Fields Too Large
    RequestHeaderFieldsTooLarge,
    /// 451 Unavailable For Legal Reasons
    UnavailableForLegalReasons,

    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
    /// 502 Bad Gateway
    BadGateway,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// 504 Gateway Timeout
    GatewayTimeout,
    /// 505 HTTP Version Not Supported
    HttpVersionNotSupported,
    /// 506 Variant Also Negotiates
    VariantAlsoNegotiates,
    /// 507 Insufficient Storage
    InsufficientStorage,
    /// 508 Loop Detected
    LoopDetected,
    /// 510 Not Extended
    NotExtended,
    /// 511 Network Authentication Required
    NetworkAuthenticationRequired,

    /// Any status code not covered above, with a caller-supplied reason
    /// phrase (used verbatim on the wire).
    Raw(u16, &'static str),
}

/// The class (first digit) of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 1xx
    Informational,
    /// 2xx
    Success,
    /// 3xx
    Redirection,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// Outside the standard classes, e.g. 0 or >= 600.
    NoClass,
}

impl StatusClass {
    /// The canonical `x00` status representing this class.
    pub fn default_code(self) -> StatusCode {
        match self {
            StatusClass::Informational => StatusCode::Continue,
            StatusClass::Success => StatusCode::Ok,
            StatusClass::Redirection => StatusCode::MultipleChoices,
            StatusClass::ClientError => StatusCode::BadRequest,
            StatusClass::ServerError => StatusCode::InternalServerError,
            StatusClass::NoClass => StatusCode::Raw(0, ""),
        }
    }
}

macro_rules! status_table {
    ($($variant:ident => ($code:expr, $reason:expr),)+) => {
        impl StatusCode {
            /// The numeric status code, e.g. `200`.
            pub fn code(&self) -> u16 {
                match self {
                    $(StatusCode::$variant => $code,)+
                    StatusCode::Raw(code, _) => *code,
                }
            }

            /// The standard reason phrase, e.g. `"OK"`.
            pub fn reason_phrase(&self) -> &str {
                match self {
                    $(StatusCode::$variant => $reason,)+
                    StatusCode::Raw(_, reason) => reason,
                }
            }

            /// Construct from a numeric code, falling back to `Raw` for
            /// anything not in the registry.
            pub fn from_code(code: u16) -> StatusCode {
                match code {
                    $($code => StatusCode::$variant,)+
                    other => StatusCode::Raw(other, ""),
                }
            }
        }
    }
}

status_table! {
    Continue => (100, "Continue"),
    SwitchingProtocols => (101, "Switching Protocols"),
    Processing => (102, "Processing"),
    Ok => (200, "OK"),
    Created => (201, "Created"),
    Accepted => (202, "Accepted"),
    NonAuthoritativeInformation => (203, "Non-Authoritative Information"),
    NoContent => (204, "No Content"),
    ResetContent => (205, "Reset Content"),
    PartialContent => (206, "Partial Content"),
    MultiStatus => (207, "Multi-Status"),
    AlreadyReported => (208, "Already Reported"),
    ImUsed => (226, "IM Used"),
    MultipleChoices => (300, "Multiple Choices"),
    MovedPermanently => (301, "Moved Permanently"),
    Found => (302, "Found"),
    SeeOther => (303, "See Other"),
    NotModified => (304, "Not Modified"),
    UseProxy => (305, "Use Proxy"),
    TemporaryRedirect => (307, "Temporary Redirect"),
    PermanentRedirect => (308, "Permanent Redirect"),
    BadRequest => (400, "Bad Request"),
    Unauthorized => (401, "Unauthorized"),
    PaymentRequired => (402, "Payment Required"),
    Forbidden => (403, "Forbidden"),
    NotFound => (404, "Not Found"),
    MethodNotAllowed => (405, "Method Not Allowed"),
    NotAcceptable => (406, "Not Acceptable"),
    ProxyAuthenticationRequired => (407, "Proxy Authentication Required"),
    RequestTimeout => (408, "Request Timeout"),
    Conflict => (409, "Conflict"),
    Gone => (410, "Gone"),
    LengthRequired => (411, "Length Required"),
    PreconditionFailed => (412, "Precondition Failed"),
    PayloadTooLarge => (413, "Content Too Large"),
    UriTooLong => (414, "URI Too Long"),
    UnsupportedMediaType => (415, "Unsupported Media Type"),
    RangeNotSatisfiable => (416, "Range Not Satisfiable"),
    ExpectationFailed => (417, "Expectation Failed"),
    ImATeapot => (418, "I'm a teapot"),
    MisdirectedRequest => (421, "Misdirected Request"),
    UnprocessableEntity => (422, "Unprocessable Content"),
    Locked => (423, "Locked"),
    FailedDependency => (424, "Failed Dependency"),
    TooEarly => (425, "Too Early"),
    UpgradeRequired => (426, "Upgrade Required"),
    PreconditionRequired => (428, "Precondition Required"),
    TooManyRequests => (429, "Too Many Requests"),
    RequestHeaderFieldsTooLarge => (431, "Request Header Fields Too Large"),
    UnavailableForLegalReasons => (451, "Unavailable For Legal Reasons"),
    InternalServerError => (500, "Internal Server Error"),
    NotImplemented => (501, "Not Implemented"),
    BadGateway => (502, "Bad Gateway"),
    ServiceUnavailable => (503, "Service Unavailable"),
    GatewayTimeout => (504, "Gateway Timeout"),
    HttpVersionNotSupported => (505, "HTTP Version Not Supported"),
    VariantAlsoNegotiates => (506, "Variant Also Negotiates"),
    InsufficientStorage => (507, "Insufficient Storage"),
    LoopDetected => (508, "Loop Detected"),
    NotExtended => (510, "Not Extended"),
    NetworkAuthenticationRequired => (511, "Network Authentication Required"),
}

impl StatusCode {
    /// An escape hatch for a status code (and reason phrase) outside the
    /// registry above.
    pub fn raw(code: u16, reason: &'static str) -> StatusCode {
        StatusCode::Raw(code, reason)
    }

    /// This status's class.
    pub fn class(&self) -> StatusClass {
        match self.code() {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::NoClass,
        }
    }

    /// Shorthand for `self.class() == StatusClass::Success`.
    pub fn is_success(&self) -> bool {
        self.class() == StatusClass::Success
    }
}

impl PartialOrd for StatusCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.code().cmp(&other.code()))
    }
}

impl Ord for StatusCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code().cmp(&other.code())
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason_phrase())
    }
}

impl From<&StatusCode> for http::StatusCode {
    fn from(s: &StatusCode) -> http::StatusCode {
        http::StatusCode::from_u16(s.code()).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}
