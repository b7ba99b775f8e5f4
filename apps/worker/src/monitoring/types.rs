use serde::{Deserialize, Serialize};

/// Derived state of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

/// Scheme used to reach a check target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// HTTP method of a probe. Stored lowercase, sent uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_upper(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A validated check definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    /// 20 character identifier, also the name of the check's log
    pub id: String,

    /// Phone number alerted on state transitions
    pub user_phone: String,

    pub protocol: Protocol,

    /// Host, path and query without the scheme
    pub url: String,

    pub method: Method,

    /// Response codes considered healthy
    pub success_codes: Vec<u16>,

    /// Probe deadline, 1 to 5 seconds
    pub timeout_seconds: u8,

    pub state: CheckState,

    /// Epoch milliseconds of the last completed probe, `None` if never probed
    pub last_check: Option<i64>,
}

impl CheckRecord {
    /// Full target, `protocol://url`
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }

    /// Copy of this record after a probe completed at `time`
    pub fn with_result(&self, state: CheckState, time: i64) -> Self {
        Self { state, last_check: Some(time), ..self.clone() }
    }
}

/// Why a probe produced no response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeError {
    Transport { detail: String },
    Timeout,
}

/// Result of one probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub response_code: Option<u16>,
    pub error: Option<ProbeError>,
}

impl CheckOutcome {
    pub fn response(status: u16) -> Self {
        Self { response_code: Some(status), error: None }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self { response_code: None, error: Some(ProbeError::Transport { detail: detail.into() }) }
    }

    pub fn timed_out() -> Self {
        Self { response_code: None, error: Some(ProbeError::Timeout) }
    }
}

/// One line of a check's log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Record as it was before the probe
    pub check: CheckRecord,
    pub outcome: CheckOutcome,
    pub state: CheckState,
    pub alert: bool,
    /// Epoch milliseconds
    pub time: i64,
}

impl LogEntry {
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
