//! Degraded responses for unavailable services.
//!
//! Pure: builds a body from the service name, the reason and the clock.
//! Never touches the network.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Why a fallback was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    BreakerOpen,
    Timeout,
    ConnectionRefused,
    Cancelled,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::BreakerOpen => "breaker_open",
            FallbackReason::Timeout => "timeout",
            FallbackReason::ConnectionRefused => "connection_refused",
            FallbackReason::Cancelled => "cancelled",
        }
    }
}

/// Body of a degraded 503 reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackResponse {
    pub service: String,
    pub message: String,
    pub timestamp: String,
    pub status: u16,
    /// Kept for logs and metrics at the call site; not part of the body.
    #[serde(skip)]
    pub reason: FallbackReason,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackResponder;

impl FallbackResponder {
    pub fn respond(&self, service: &str, reason: FallbackReason) -> FallbackResponse {
        self.respond_at(service, reason, Utc::now())
    }

    pub fn respond_at(&self, service: &str, reason: FallbackReason, now: DateTime<Utc>) -> FallbackResponse {
        FallbackResponse {
            service: service.to_string(),
            message: format!(
                "{} service is temporarily unavailable. Please try again later.",
                display_title(service)
            ),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            status: 503,
            reason,
        }
    }
}

/// `weather-service` → `Weather`, `user-profile-service` → `User Profile`.
fn display_title(service: &str) -> String {
    let base = service.strip_suffix("-service").unwrap_or(service);
    base.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn weather_fallback_body() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let body = FallbackResponder.respond_at("weather-service", FallbackReason::Timeout, now);

        assert_eq!(body.service, "weather-service");
        assert_eq!(
            body.message,
            "Weather service is temporarily unavailable. Please try again later."
        );
        assert_eq!(body.timestamp, "2024-03-01T12:00:00.000Z");
        assert_eq!(body.status, 503);
    }

    #[test]
    fn same_inputs_differ_only_in_timestamp() {
        let a = FallbackResponder.respond("news-service", FallbackReason::BreakerOpen);
        let b = FallbackResponder.respond("news-service", FallbackReason::BreakerOpen);
        assert_eq!(a.service, b.service);
        assert_eq!(a.message, b.message);
        assert_eq!(a.status, b.status);
    }

    #[test]
    fn reason_stays_out_of_the_body() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let body = FallbackResponder.respond_at("news-service", FallbackReason::Cancelled, now);
        assert_eq!(body.reason, FallbackReason::Cancelled);

        let json = serde_json::to_value(&body).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["message", "service", "status", "timestamp"]);
    }

    #[test]
    fn titles() {
        assert_eq!(display_title("financial-service"), "Financial");
        assert_eq!(display_title("user-profile-service"), "User Profile");
        assert_eq!(display_title("billing"), "Billing");
    }
}
