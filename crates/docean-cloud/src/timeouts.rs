//! Per-operation timeouts

use crate::error::{CloudError, Result};
use crate::waiter::DEFAULT_TIMEOUT;
use std::time::Duration;

/// Config key holding user overrides, e.g. `{"timeouts": {"create": "10m"}}`
pub const TIMEOUTS_KEY: &str = "timeouts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            read: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn get(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    pub fn create(mut self, d: Duration) -> Self {
        self.create = d;
        self
    }

    pub fn update(mut self, d: Duration) -> Self {
        self.update = d;
        self
    }

    pub fn delete(mut self, d: Duration) -> Self {
        self.delete = d;
        self
    }

    /// Apply overrides from a resource configuration
    pub fn with_overrides(self, config: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        match config.get(TIMEOUTS_KEY).and_then(|v| v.as_object()) {
            Some(overrides) => self.with_override_map(overrides),
            None => Ok(self),
        }
    }

    /// Apply an override map such as `{"delete": "20m"}`
    pub fn with_override_map(mut self, overrides: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        for (key, value) in overrides {
            let Some(text) = value.as_str() else {
                return Err(CloudError::InvalidConfig(format!(
                    "timeouts.{key} must be a duration string"
                )));
            };
            let d = parse_duration(text)
                .map_err(|e| CloudError::InvalidConfig(format!("timeouts.{key}: {e}")))?;
            match key.as_str() {
                "create" => self.create = d,
                "read" => self.read = d,
                "update" => self.update = d,
                "delete" => self.delete = d,
                other => {
                    return Err(CloudError::InvalidConfig(format!(
                        "unsupported timeout '{other}'"
                    )));
                }
            }
        }
        Ok(self)
    }
}

/// Parse durations such as `90s`, `5m`, `1h30m` or `250ms`
pub fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("missing unit in '{text}'"))?;
        if digits == 0 {
            return Err(format!("invalid duration '{text}'"));
        }
        let amount: f64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid number in '{text}'"))?;
        rest = &rest[digits..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let secs = match &rest[..unit_len] {
            "ms" => amount / 1000.0,
            "s" => amount,
            "m" => amount * 60.0,
            "h" => amount * 3600.0,
            unit => return Err(format!("unknown unit '{unit}' in '{text}'")),
        };
        total += Duration::from_secs_f64(secs);
        rest = &rest[unit_len..];
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_overrides() {
        let config = json!({"timeouts": {"create": "10s", "delete": "3m"}});
        let t = Timeouts::default()
            .with_overrides(config.as_object().unwrap())
            .unwrap();
        assert_eq!(t.get(Operation::Create), Duration::from_secs(10));
        assert_eq!(t.get(Operation::Delete), Duration::from_secs(180));
        assert_eq!(t.get(Operation::Update), DEFAULT_TIMEOUT);

        let bad = json!({"timeouts": {"destroy": "1m"}});
        assert!(Timeouts::default().with_overrides(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_override_map() {
        let stored = json!({"delete": "20s"});
        let t = Timeouts::default()
            .delete(Duration::from_secs(180))
            .with_override_map(stored.as_object().unwrap())
            .unwrap();
        assert_eq!(t.delete, Duration::from_secs(20));
        assert_eq!(t.create, DEFAULT_TIMEOUT);
    }
}
