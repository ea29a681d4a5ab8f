//! Component properties and configuration sources
//!
//! Property files are plain text, one `key = value` per line, with `#`
//! comments. Keys are the same ids accepted by `Component::configure`.

use super::errors::PropertyError;
use super::limiter::OverflowPolicy;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Property ids
pub mod ids {
    pub const MSG_RECV: &str = "msg_recv";
    pub const MSG_XMIT: &str = "msg_xmit";
    pub const MSG_SUPPRESSED: &str = "msg_suppressed";
    pub const MSG_LIMIT: &str = "msg_limit";
    pub const LIMIT_WINDOW_MS: &str = "limit_window_ms";
    pub const OVERFLOW_POLICY: &str = "overflow_policy";
    pub const BACKLOG_CAPACITY: &str = "backlog_capacity";
    pub const POLL_INTERVAL_MS: &str = "poll_interval_ms";
    pub const RETRY_LIMIT: &str = "retry_limit";
    pub const MAX_BACKOFF_MS: &str = "max_backoff_ms";
    pub const STOP_TIMEOUT_MS: &str = "stop_timeout_ms";
    pub const WATCHDOG_THRESHOLD_MS: &str = "watchdog_threshold_ms";

    /// Counters exposed to external callers, never writable
    pub const READ_ONLY: [&str; 3] = [MSG_RECV, MSG_XMIT, MSG_SUPPRESSED];

    pub const ALL: [&str; 12] = [
        MSG_RECV,
        MSG_XMIT,
        MSG_SUPPRESSED,
        MSG_LIMIT,
        LIMIT_WINDOW_MS,
        OVERFLOW_POLICY,
        BACKLOG_CAPACITY,
        POLL_INTERVAL_MS,
        RETRY_LIMIT,
        MAX_BACKOFF_MS,
        STOP_TIMEOUT_MS,
        WATCHDOG_THRESHOLD_MS,
    ];
}

/// A property value as exchanged with external tooling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Long(u64),
    Text(String),
}

impl PropertyValue {
    fn as_u64(&self, id: &str) -> Result<u64, PropertyError> {
        match self {
            PropertyValue::Long(value) => Ok(*value),
            PropertyValue::Text(text) => text.trim().parse().map_err(|_| invalid(id, text)),
        }
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PropertyValue::Long(value) => write!(f, "{}", value),
            PropertyValue::Text(text) => f.write_str(text),
        }
    }
}

fn invalid(id: &str, value: impl fmt::Display) -> PropertyError {
    PropertyError::InvalidValue {
        id: id.to_string(),
        value: value.to_string(),
    }
}

fn millis(value: Duration) -> PropertyValue {
    PropertyValue::Long(value.as_millis() as u64)
}

/// Configuration of a component and its worker loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentProperties {
    /// Transmit budget per accounting window, 0 = unlimited
    pub message_limit: u64,
    /// Accounting window length; `None` spans one run
    pub limit_window: Option<Duration>,
    pub overflow_policy: OverflowPolicy,
    /// Maximum deferred units held under `OverflowPolicy::Defer`
    pub backlog_capacity: usize,
    /// Bounded wait for input, and the idle back-off
    pub poll_interval: Duration,
    /// Consecutive resource failures tolerated, 0 = retry forever
    pub retry_limit: u32,
    pub max_backoff: Duration,
    /// Interval at which `stop()` reports a worker that has not quiesced
    pub stop_timeout: Duration,
    pub watchdog_threshold: Duration,
}

impl Default for ComponentProperties {
    fn default() -> Self {
        Self {
            message_limit: 0,
            limit_window: None,
            overflow_policy: OverflowPolicy::Drop,
            backlog_capacity: 1024,
            poll_interval: Duration::from_millis(100),
            retry_limit: 10,
            max_backoff: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(5),
            watchdog_threshold: Duration::from_secs(5),
        }
    }
}

impl ComponentProperties {
    pub fn with_message_limit(mut self, limit: u64) -> Self {
        self.message_limit = limit;
        self
    }

    /// A zero window means the same as `None`
    pub fn with_limit_window(mut self, window: Option<Duration>) -> Self {
        self.limit_window = window.filter(|w| !w.is_zero());
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_limit(mut self, retries: u32) -> Self {
        self.retry_limit = retries;
        self
    }

    /// Check a set of properties built outside of [`set`](Self::set).
    ///
    /// Applies the same rules `set` enforces per property: the poll interval
    /// and stop timeout must be non-zero, and a zero window spans one run.
    pub fn validate(mut self) -> Result<Self, PropertyError> {
        if self.poll_interval.is_zero() {
            return Err(invalid(ids::POLL_INTERVAL_MS, 0));
        }
        if self.stop_timeout.is_zero() {
            return Err(invalid(ids::STOP_TIMEOUT_MS, 0));
        }
        self.limit_window = self.limit_window.filter(|w| !w.is_zero());
        Ok(self)
    }

    /// Read a configuration property. Counters are not held here.
    pub fn get(&self, id: &str) -> Option<PropertyValue> {
        let value = match id {
            ids::MSG_LIMIT => PropertyValue::Long(self.message_limit),
            ids::LIMIT_WINDOW_MS => self.limit_window.map_or(PropertyValue::Long(0), millis),
            ids::OVERFLOW_POLICY => PropertyValue::Text(self.overflow_policy.to_string()),
            ids::BACKLOG_CAPACITY => PropertyValue::Long(self.backlog_capacity as u64),
            ids::POLL_INTERVAL_MS => millis(self.poll_interval),
            ids::RETRY_LIMIT => PropertyValue::Long(u64::from(self.retry_limit)),
            ids::MAX_BACKOFF_MS => millis(self.max_backoff),
            ids::STOP_TIMEOUT_MS => millis(self.stop_timeout),
            ids::WATCHDOG_THRESHOLD_MS => millis(self.watchdog_threshold),
            _ => return None,
        };
        Some(value)
    }

    /// Write a configuration property
    pub fn set(&mut self, id: &str, value: &PropertyValue) -> Result<(), PropertyError> {
        if ids::READ_ONLY.contains(&id) {
            return Err(PropertyError::ReadOnly(id.to_string()));
        }

        match id {
            ids::MSG_LIMIT => self.message_limit = value.as_u64(id)?,
            ids::LIMIT_WINDOW_MS => {
                let ms = value.as_u64(id)?;
                self.limit_window = (ms > 0).then(|| Duration::from_millis(ms));
            }
            ids::OVERFLOW_POLICY => {
                self.overflow_policy = value.to_string().parse().map_err(|_| invalid(id, value))?;
            }
            ids::BACKLOG_CAPACITY => {
                self.backlog_capacity =
                    usize::try_from(value.as_u64(id)?).map_err(|_| invalid(id, value))?;
            }
            ids::POLL_INTERVAL_MS => {
                let ms = value.as_u64(id)?;
                if ms == 0 {
                    return Err(invalid(id, value));
                }
                self.poll_interval = Duration::from_millis(ms);
            }
            ids::RETRY_LIMIT => {
                self.retry_limit = u32::try_from(value.as_u64(id)?).map_err(|_| invalid(id, value))?;
            }
            ids::MAX_BACKOFF_MS => self.max_backoff = Duration::from_millis(value.as_u64(id)?),
            ids::STOP_TIMEOUT_MS => {
                let ms = value.as_u64(id)?;
                if ms == 0 {
                    return Err(invalid(id, value));
                }
                self.stop_timeout = Duration::from_millis(ms);
            }
            ids::WATCHDOG_THRESHOLD_MS => {
                self.watchdog_threshold = Duration::from_millis(value.as_u64(id)?);
            }
            _ => return Err(PropertyError::Unknown(id.to_string())),
        }
        Ok(())
    }

    /// Parse `key = value` lines on top of the defaults
    pub fn parse(content: &str) -> Result<Self, PropertyError> {
        let mut properties = Self::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| PropertyError::Parse {
                line: index + 1,
                message: format!("expected 'key = value', got '{}'", line),
            })?;

            properties
                .set(key.trim(), &PropertyValue::Text(value.trim().to_string()))
                .map_err(|e| PropertyError::Parse {
                    line: index + 1,
                    message: e.to_string(),
                })?;
        }

        Ok(properties)
    }
}

/// External source of initial configuration
pub trait PropertySource {
    fn load(&self) -> Result<ComponentProperties, PropertyError>;
}

impl PropertySource for ComponentProperties {
    fn load(&self) -> Result<ComponentProperties, PropertyError> {
        self.clone().validate()
    }
}

/// Property file on disk
#[derive(Debug, Clone)]
pub struct PropertyFile {
    path: PathBuf,
}

impl PropertyFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PropertySource for PropertyFile {
    fn load(&self) -> Result<ComponentProperties, PropertyError> {
        let content = std::fs::read_to_string(&self.path)?;
        ComponentProperties::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_overrides_defaults() {
        let props = ComponentProperties::parse(
            "# ECM settings\n\
             msg_limit = 5\n\
             limit_window_ms = 1000\n\
             overflow_policy = defer\n\
             \n\
             poll_interval_ms = 20\n",
        )
        .unwrap();

        assert_eq!(props.message_limit, 5);
        assert_eq!(props.limit_window, Some(Duration::from_secs(1)));
        assert_eq!(props.overflow_policy, OverflowPolicy::Defer);
        assert_eq!(props.poll_interval, Duration::from_millis(20));
        assert_eq!(props.retry_limit, ComponentProperties::default().retry_limit);
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        let err = ComponentProperties::parse("msg_limit = 5\nbogus line\n").unwrap_err();
        assert!(matches!(err, PropertyError::Parse { line: 2, .. }));

        let err = ComponentProperties::parse("msg_limit = -1\n").unwrap_err();
        assert!(matches!(err, PropertyError::Parse { line: 1, .. }));

        let err = ComponentProperties::parse("msg_recv = 3\n").unwrap_err();
        assert!(err.to_string().contains("read-only"));

        let err = ComponentProperties::parse("frobnicate = 3\n").unwrap_err();
        assert!(err.to_string().contains("unknown property"));
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut props = ComponentProperties::default();
        props.set(ids::MSG_LIMIT, &PropertyValue::Long(9)).unwrap();
        props.set(ids::OVERFLOW_POLICY, &"defer".into()).unwrap();
        props.set(ids::LIMIT_WINDOW_MS, &PropertyValue::Long(0)).unwrap();

        assert_eq!(props.get(ids::MSG_LIMIT), Some(PropertyValue::Long(9)));
        assert_eq!(props.get(ids::OVERFLOW_POLICY), Some("defer".into()));
        assert_eq!(props.get(ids::LIMIT_WINDOW_MS), Some(PropertyValue::Long(0)));
        assert_eq!(props.limit_window, None);
        assert_eq!(props.get(ids::MSG_RECV), None);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut props = ComponentProperties::default();
        let err = props.set(ids::POLL_INTERVAL_MS, &PropertyValue::Long(0)).unwrap_err();
        assert!(matches!(err, PropertyError::InvalidValue { .. }));
    }

    #[test]
    fn test_validate_applies_set_rules_to_built_properties() {
        let zero_poll = ComponentProperties {
            poll_interval: Duration::ZERO,
            ..ComponentProperties::default()
        };
        let err = zero_poll.validate().unwrap_err();
        assert!(matches!(err, PropertyError::InvalidValue { ref id, .. } if id == ids::POLL_INTERVAL_MS));

        let zero_stop = ComponentProperties {
            stop_timeout: Duration::ZERO,
            ..ComponentProperties::default()
        };
        assert!(zero_stop.load().is_err());

        let zero_window = ComponentProperties {
            limit_window: Some(Duration::ZERO),
            ..ComponentProperties::default()
        };
        assert_eq!(zero_window.validate().unwrap().limit_window, None);

        let built = ComponentProperties::default().with_limit_window(Some(Duration::ZERO));
        assert_eq!(built.limit_window, None);
    }

    #[test]
    fn test_property_file_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "msg_limit = 42").unwrap();
        writeln!(file, "retry_limit = 3").unwrap();

        let props = PropertyFile::new(file.path()).load().unwrap();
        assert_eq!(props.message_limit, 42);
        assert_eq!(props.retry_limit, 3);
    }

    #[test]
    fn test_missing_property_file() {
        let err = PropertyFile::new("/nonexistent/ecm.properties").load().unwrap_err();
        assert!(matches!(err, PropertyError::Io(_)));
    }
}
