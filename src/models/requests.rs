//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

fn default_reason() -> String {
    "manual".to_string()
}

/// Request body for POST /invalidate
///
/// # Fields
/// - `pattern`: Glob pattern selecting the keys to drop
/// - `reason`: Free-form label for logs and the audit log (default: "manual")
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub pattern: String,
    #[serde(default = "default_reason")]
    pub reason: String,
}

impl InvalidateRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.trim().is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if self.pattern.len() > 512 {
            return Some("Pattern exceeds maximum length of 512 characters".to_string());
        }
        None
    }
}

/// Request body for POST /warmup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarmupRequest {
    /// Also warm hot keys from access patterns
    #[serde(default)]
    pub full: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_request_deserialize() {
        let json = r#"{"pattern": "user:123:*", "reason": "user-update"}"#;
        let req: InvalidateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.pattern, "user:123:*");
        assert_eq!(req.reason, "user-update");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_invalidate_request_default_reason() {
        let req: InvalidateRequest = serde_json::from_str(r#"{"pattern": "k"}"#).unwrap();
        assert_eq!(req.reason, "manual");
    }

    #[test]
    fn test_validate_empty_pattern() {
        let req = InvalidateRequest {
            pattern: "  ".to_string(),
            reason: default_reason(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_warmup_request_defaults_to_baseline() {
        let req: WarmupRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.full);
    }
}
