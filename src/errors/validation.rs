//! Typed rejection reasons for proxy-declared node metadata.
//!
//! Every variant carries a machine-readable [`ValidationErrorKind`] and a
//! stable human-readable message. Messages are part of the contract with
//! connecting proxies and are asserted verbatim in tests; do not reword them
//! casually.

use std::fmt;

/// Machine-readable classification of a metadata rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// An endpoint defined zero or more than one of the path fields.
    ExactlyOnePathField,
    /// A dependency defined zero or both of `service`/`domain`.
    ExactlyOneDependencyField,
    /// A domain dependency used a scheme other than http/https.
    UnsupportedProtocol,
    /// A timeout value was not a parseable duration string.
    InvalidTimeoutFormat,
    /// Global config requires a service name and none was declared.
    ServiceNameRequired,
    /// The wildcard dependency is reserved for allow-listed services.
    AllDependenciesNotAllowed,
    /// A dependency declared routing tags without the mandated prefix.
    ServiceTagPrefixMissing,
    /// An endpoint declared an HTTP method outside the supported set.
    UnknownHttpMethod,
    /// The wildcard client was combined with other clients on one endpoint.
    WildcardPrincipalMixedWithOthers,
    /// The wildcard client is reserved for allow-listed services.
    WildcardPrincipalNotAllowed,
    /// A rate-limit value did not match `<number>/(s|m|h)`.
    RateLimitIncorrect,
    /// The requested communication mode is disabled server-side.
    CommunicationModeNotSupported,
}

impl ValidationErrorKind {
    /// Stable identifier suitable for structured logs and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ExactlyOnePathField => "exactly_one_path_field",
            Self::ExactlyOneDependencyField => "exactly_one_dependency_field",
            Self::UnsupportedProtocol => "unsupported_protocol",
            Self::InvalidTimeoutFormat => "invalid_timeout_format",
            Self::ServiceNameRequired => "service_name_required",
            Self::AllDependenciesNotAllowed => "all_dependencies_not_allowed",
            Self::ServiceTagPrefixMissing => "service_tag_prefix_missing",
            Self::UnknownHttpMethod => "unknown_http_method",
            Self::WildcardPrincipalMixedWithOthers => "wildcard_principal_mixed_with_others",
            Self::WildcardPrincipalNotAllowed => "wildcard_principal_not_allowed",
            Self::RateLimitIncorrect => "rate_limit_incorrect",
            Self::CommunicationModeNotSupported => "communication_mode_not_supported",
        }
    }
}

/// A single metadata rejection: kind plus stable message.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new<S: Into<String>>(kind: ValidationErrorKind, message: S) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn both_path_fields() -> Self {
        Self::new(
            ValidationErrorKind::ExactlyOnePathField,
            "Precisely one of 'path' and 'pathPrefix' field is allowed",
        )
    }

    pub fn no_path_field() -> Self {
        Self::new(
            ValidationErrorKind::ExactlyOnePathField,
            "One of 'path' or 'pathPrefix' field is required",
        )
    }

    pub fn service_or_domain_required() -> Self {
        Self::new(
            ValidationErrorKind::ExactlyOneDependencyField,
            "Define either 'service' or 'domain' as an outgoing dependency",
        )
    }

    pub fn unsupported_protocol(domain: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnsupportedProtocol,
            format!("Unsupported protocol for domain dependency for domain {}", domain),
        )
    }

    pub fn timeout_wrong_type() -> Self {
        Self::new(
            ValidationErrorKind::InvalidTimeoutFormat,
            "Timeout definition has number format but should be in string format and ends with 's'",
        )
    }

    pub fn timeout_incorrect_format(detail: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidTimeoutFormat,
            format!("Timeout definition has incorrect format: {}", detail),
        )
    }

    pub fn service_name_required() -> Self {
        Self::new(
            ValidationErrorKind::ServiceNameRequired,
            "Service name is required and was not found in node metadata",
        )
    }

    pub fn all_dependencies_not_allowed(service_name: &str) -> Self {
        Self::new(
            ValidationErrorKind::AllDependenciesNotAllowed,
            format!(
                "Blocked service {} from using all dependencies. \
                 Only defined services can use all dependencies",
                service_name
            ),
        )
    }

    pub fn service_tag_prefix_missing(
        service_name: &str,
        prefix: &str,
        violating_tags: &[String],
    ) -> Self {
        Self::new(
            ValidationErrorKind::ServiceTagPrefixMissing,
            format!(
                "Blocked service {} from using service tags [{}] without mandatory prefix '{}'",
                service_name,
                violating_tags.join(", "),
                prefix
            ),
        )
    }

    pub fn unknown_http_method(method: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnknownHttpMethod,
            format!("Method '{}' is not a supported HTTP method", method),
        )
    }

    pub fn wildcard_mixed_with_others(service_name: &str, path: &str) -> Self {
        Self::new(
            ValidationErrorKind::WildcardPrincipalMixedWithOthers,
            format!(
                "Blocked service {} from defining wildcard client together with other clients \
                 for endpoint {}",
                service_name, path
            ),
        )
    }

    pub fn wildcard_not_allowed(service_name: &str, path: &str) -> Self {
        Self::new(
            ValidationErrorKind::WildcardPrincipalNotAllowed,
            format!(
                "Blocked service {} from using wildcard client for endpoint {}. \
                 Only defined services can use it",
                service_name, path
            ),
        )
    }

    pub fn rate_limit_incorrect(value: &str) -> Self {
        Self::new(
            ValidationErrorKind::RateLimitIncorrect,
            format!("Rate limit value: {} is incorrect. Should be in format: <number>/(s|m|h)", value),
        )
    }

    pub fn communication_mode_not_supported(service_name: &str, mode: &str) -> Self {
        Self::new(
            ValidationErrorKind::CommunicationModeNotSupported,
            format!(
                "Blocked service {} from receiving updates. {} is not supported by server",
                service_name, mode
            ),
        )
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_field_messages_are_stable() {
        assert_eq!(
            ValidationError::both_path_fields().to_string(),
            "Precisely one of 'path' and 'pathPrefix' field is allowed"
        );
        assert_eq!(
            ValidationError::no_path_field().to_string(),
            "One of 'path' or 'pathPrefix' field is required"
        );
    }

    #[test]
    fn kind_codes_are_distinct() {
        let kinds = [
            ValidationErrorKind::ExactlyOnePathField,
            ValidationErrorKind::ExactlyOneDependencyField,
            ValidationErrorKind::UnsupportedProtocol,
            ValidationErrorKind::InvalidTimeoutFormat,
            ValidationErrorKind::ServiceNameRequired,
            ValidationErrorKind::AllDependenciesNotAllowed,
            ValidationErrorKind::ServiceTagPrefixMissing,
            ValidationErrorKind::UnknownHttpMethod,
            ValidationErrorKind::WildcardPrincipalMixedWithOthers,
            ValidationErrorKind::WildcardPrincipalNotAllowed,
            ValidationErrorKind::RateLimitIncorrect,
            ValidationErrorKind::CommunicationModeNotSupported,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn wildcard_mixed_message_names_service_and_endpoint() {
        let error = ValidationError::wildcard_mixed_with_others("echo", "/api");
        assert_eq!(error.kind, ValidationErrorKind::WildcardPrincipalMixedWithOthers);
        assert!(error.message.contains("echo"));
        assert!(error.message.contains("/api"));
    }
}
