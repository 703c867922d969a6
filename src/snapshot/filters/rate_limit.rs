//! Local rate limit filter compiler.
//!
//! The listener-level filter is only armed when the group declares
//! rate-limited endpoints; the actual token buckets live in per-route typed
//! configs built by the route compiler from the declared `<requests>/<unit>`
//! specs.

use std::time::Duration as StdDuration;

use envoy_types::pb::envoy::config::core::v3::RuntimeFractionalPercent;
use envoy_types::pb::envoy::extensions::filters::http::local_ratelimit::v3::LocalRateLimit;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::HttpFilter;
use envoy_types::pb::envoy::r#type::v3::{fractional_percent, FractionalPercent, TokenBucket};
use envoy_types::pb::google::protobuf::{Any, Duration, UInt32Value};

use crate::groups::Group;

use super::{any_from_message, http_filter, LOCAL_RATE_LIMIT_FILTER_NAME};

pub const LOCAL_RATE_LIMIT_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.http.local_ratelimit.v3.LocalRateLimit";

const STAT_PREFIX: &str = "ingress_rate_limit";

pub struct RateLimitFilterFactory;

impl RateLimitFilterFactory {
    pub fn new() -> Self {
        Self
    }

    /// The listener-level filter, or `None` when the group declares no
    /// rate-limited endpoints. Without a token bucket of its own the filter
    /// only activates where a per-route config provides one.
    pub fn filter(&self, group: &Group) -> Option<HttpFilter> {
        if group.proxy_settings.incoming.rate_limit_endpoints.is_empty() {
            return None;
        }
        let config = LocalRateLimit {
            stat_prefix: STAT_PREFIX.to_string(),
            filter_enabled: Some(always(format!("{STAT_PREFIX}.enabled"))),
            filter_enforced: Some(always(format!("{STAT_PREFIX}.enforced"))),
            ..Default::default()
        };
        Some(http_filter(
            LOCAL_RATE_LIMIT_FILTER_NAME,
            any_from_message(LOCAL_RATE_LIMIT_TYPE_URL, &config),
        ))
    }
}

impl Default for RateLimitFilterFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-route typed config for one rate-limited endpoint. `None` when the
/// declared value does not parse; the validator rejects such metadata before
/// it gets here.
pub fn per_route_config(path: &str, rate_limit: &str) -> Option<Any> {
    let (tokens, fill_interval) = parse_rate_limit(rate_limit)?;
    let config = LocalRateLimit {
        stat_prefix: format!("{STAT_PREFIX}.{path}"),
        token_bucket: Some(TokenBucket {
            max_tokens: tokens,
            tokens_per_fill: Some(UInt32Value { value: tokens }),
            fill_interval: Some(Duration {
                seconds: fill_interval.as_secs() as i64,
                nanos: 0,
            }),
        }),
        filter_enabled: Some(always(format!("{STAT_PREFIX}.enabled"))),
        filter_enforced: Some(always(format!("{STAT_PREFIX}.enforced"))),
        ..Default::default()
    };
    Some(any_from_message(LOCAL_RATE_LIMIT_TYPE_URL, &config))
}

/// Parse `<requests>/<unit>` where unit is one of `s`, `m`, `h`.
pub fn parse_rate_limit(spec: &str) -> Option<(u32, StdDuration)> {
    let (requests, unit) = spec.split_once('/')?;
    if requests != "0" && (requests.is_empty() || requests.starts_with('0')) {
        return None;
    }
    let tokens = requests.parse::<u32>().ok()?;
    let fill_interval = match unit {
        "s" => StdDuration::from_secs(1),
        "m" => StdDuration::from_secs(60),
        "h" => StdDuration::from_secs(3600),
        _ => return None,
    };
    Some((tokens, fill_interval))
}

fn always(runtime_key: String) -> RuntimeFractionalPercent {
    RuntimeFractionalPercent {
        default_value: Some(FractionalPercent {
            numerator: 100,
            denominator: fractional_percent::DenominatorType::Hundred as i32,
        }),
        runtime_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::GroupKind;
    use crate::metadata::{
        CommunicationMode, Incoming, PathMatchingType, ProxySettings, RateLimitEndpoint,
    };
    use prost::Message;

    fn group(rate_limits: Vec<RateLimitEndpoint>) -> Group {
        Group {
            kind: GroupKind::Services,
            communication_mode: CommunicationMode::Ads,
            service_name: "echo".to_string(),
            discovery_service_name: None,
            proxy_settings: ProxySettings {
                incoming: Incoming {
                    permissions_enabled: true,
                    rate_limit_endpoints: rate_limits,
                    ..Default::default()
                },
                outgoing: Default::default(),
            },
            listeners_config: None,
        }
    }

    #[test]
    fn no_filter_without_rate_limited_endpoints() {
        assert!(RateLimitFilterFactory::new().filter(&group(vec![])).is_none());
    }

    #[test]
    fn filter_armed_for_declared_rate_limits() {
        let filter = RateLimitFilterFactory::new()
            .filter(&group(vec![RateLimitEndpoint {
                path: "/orders".to_string(),
                path_matching_type: PathMatchingType::Path,
                methods: Default::default(),
                rate_limit: "10/s".to_string(),
            }]))
            .unwrap();
        assert_eq!(filter.name, LOCAL_RATE_LIMIT_FILTER_NAME);
    }

    #[test]
    fn parses_all_units() {
        assert_eq!(parse_rate_limit("10/s"), Some((10, StdDuration::from_secs(1))));
        assert_eq!(parse_rate_limit("100/m"), Some((100, StdDuration::from_secs(60))));
        assert_eq!(parse_rate_limit("0/h"), Some((0, StdDuration::from_secs(3600))));
    }

    #[test]
    fn rejects_malformed_specs() {
        assert_eq!(parse_rate_limit("10"), None);
        assert_eq!(parse_rate_limit("007/s"), None);
        assert_eq!(parse_rate_limit("10/d"), None);
        assert_eq!(parse_rate_limit("/s"), None);
    }

    #[test]
    fn per_route_config_carries_token_bucket() {
        let any = per_route_config("/orders", "100/m").unwrap();
        let config = LocalRateLimit::decode(any.value.as_slice())
            .unwrap_or_else(|e| panic!("decodes: {e}"));
        let bucket = config.token_bucket.unwrap();
        assert_eq!(bucket.max_tokens, 100);
        assert_eq!(bucket.fill_interval.map(|d| d.seconds), Some(60));
    }
}
