//! Per-call observability records.

use crate::service::RequestMethod;
use crate::Time;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Request details attached to a network stat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Full request URI
    pub uri: String,
    /// HTTP method
    pub method: RequestMethod,
    /// Timeout in milliseconds
    pub timeout_ms: u64,
}

/// One observation about a service call or probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatRecord {
    /// Service key
    pub service_key: String,

    /// Error message, if the call failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Warning message, if the call degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    /// Response time in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,

    /// Request sent, for network services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_options: Option<RequestOptions>,

    /// When the record was created
    pub recorded_at: Time,
}

impl ServiceStatRecord {
    /// Empty record for a service.
    pub fn new(service_key: impl Into<String>) -> Self {
        Self {
            service_key: service_key.into(),
            error: None,
            warning: None,
            response_time: None,
            request_options: None,
            recorded_at: Utc::now(),
        }
    }

    /// Set the error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the warning message.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    /// Set the response time in seconds.
    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time = Some(seconds);
        self
    }

    /// Attach request options.
    pub fn with_request_options(mut self, options: RequestOptions) -> Self {
        self.request_options = Some(options);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_skips_empty_fields() {
        let record = ServiceStatRecord::new("svc").with_warning("Cannot connect");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["service_key"], "svc");
        assert_eq!(value["warning"], "Cannot connect");
        assert!(value.get("error").is_none());
        assert!(value.get("request_options").is_none());
    }
}
