//! Attribute validators.
//!
//! The host runs these before any mapping or payload construction, so the
//! mappers may assume well-formed input. Null and unknown values are skipped;
//! presence is the schema's concern, not the validator's.
//!
//! # Example
//!
//! ```
//! use stratus_provider::validation::Validator;
//! use stratus_provider::value::Value;
//!
//! let diagnostics = Validator::new()
//!     .duration("scrape_interval", &Value::Known("5m".to_string()))
//!     .one_of("scheme", &Value::Known("ftp".to_string()), &["http", "https"])
//!     .finish();
//!
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("scheme".to_string()));
//! ```

use std::net::IpAddr;

use crate::diagnostics::Diagnostic;
use crate::value::Value;

/// Units accepted in duration strings, longest first so `ms` wins over `m`.
const DURATION_UNITS: &[&str] = &["ms", "s", "m", "h", "d", "w", "y"];

/// Collects diagnostics from a chain of attribute checks.
#[derive(Debug, Default)]
pub struct Validator {
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    /// Start an empty validation pass.
    pub fn new() -> Self {
        Self::default()
    }

    fn check(mut self, result: Option<Diagnostic>) -> Self {
        self.diagnostics.extend(result);
        self
    }

    /// Require a duration string such as `30s`, `5m` or `1h30m`.
    pub fn duration(self, path: &str, value: &Value<String>) -> Self {
        let result = value
            .as_known()
            .filter(|v| !is_duration(v))
            .map(|v| invalid(path, "Invalid duration", format!("{:?} is not a duration like 30s, 5m or 1h30m", v)));
        self.check(result)
    }

    /// Require a UUID.
    pub fn uuid(self, path: &str, value: &Value<String>) -> Self {
        let result = value
            .as_known()
            .filter(|v| uuid::Uuid::parse_str(v).is_err())
            .map(|v| invalid(path, "Invalid UUID", format!("{:?} is not a valid UUID", v)));
        self.check(result)
    }

    /// Require a string length within `min..=max` characters.
    pub fn length(self, path: &str, value: &Value<String>, min: usize, max: usize) -> Self {
        let result = value.as_known().and_then(|v| {
            let len = v.chars().count();
            (len < min || len > max).then(|| {
                invalid(
                    path,
                    "Invalid length",
                    format!("length must be between {} and {}, got {}", min, max, len),
                )
            })
        });
        self.check(result)
    }

    /// Require one of `allowed`.
    pub fn one_of(self, path: &str, value: &Value<String>, allowed: &[&str]) -> Self {
        let result = value
            .as_known()
            .filter(|v| !allowed.contains(&v.as_str()))
            .map(|v| {
                invalid(
                    path,
                    "Invalid value",
                    format!("{:?} must be one of {:?}", v, allowed),
                )
            });
        self.check(result)
    }

    /// Require CIDR notation (`10.0.0.0/24`, `2001:db8::/32`).
    pub fn cidr(self, path: &str, value: &Value<String>) -> Self {
        let result = value
            .as_known()
            .filter(|v| !is_cidr(v))
            .map(|v| invalid(path, "Invalid CIDR", format!("{:?} is not in CIDR notation", v)));
        self.check(result)
    }

    /// Require every element of a set or list to be in CIDR notation.
    pub fn cidrs<'a>(mut self, path: &str, values: impl IntoIterator<Item = &'a String>) -> Self {
        for (i, v) in values.into_iter().enumerate() {
            if !is_cidr(v) {
                self.diagnostics.push(invalid(
                    &format!("{}.{}", path, i),
                    "Invalid CIDR",
                    format!("{:?} is not in CIDR notation", v),
                ));
            }
        }
        self
    }

    /// Finish and return the collected diagnostics.
    pub fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Finish, returning `Err` with the diagnostics if any were collected.
    pub fn into_result(self) -> Result<(), Vec<Diagnostic>> {
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(self.diagnostics)
        }
    }
}

fn invalid(path: &str, summary: &str, detail: String) -> Diagnostic {
    Diagnostic::error(summary)
        .with_detail(detail)
        .with_attribute(path)
}

/// Whether `raw` is a duration string: one or more `<digits><unit>` groups.
pub fn is_duration(raw: &str) -> bool {
    let mut rest = raw;
    if rest.is_empty() {
        return false;
    }
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
        match DURATION_UNITS.iter().find(|unit| rest.starts_with(**unit)) {
            Some(unit) => rest = &rest[unit.len()..],
            None => return false,
        }
    }
    true
}

/// Whether `raw` is an IPv4 or IPv6 network in CIDR notation.
pub fn is_cidr(raw: &str) -> bool {
    let Some((addr, prefix)) = raw.split_once('/') else {
        return false;
    };
    let Ok(addr) = addr.parse::<IpAddr>() else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    match addr {
        IpAddr::V4(_) => prefix <= 32,
        IpAddr::V6(_) => prefix <= 128,
    }
}
