//! Listener builders.
//!
//! Only proxies that declared a complete listener configuration get dynamic
//! listeners; everyone else manages their own. Each listener embeds an HTTP
//! connection manager carrying the compiled filter pipeline and an RDS
//! reference to the matching route configuration.

use envoy_types::pb::envoy::config::accesslog::v3::{access_log, AccessLog};
use envoy_types::pb::envoy::config::listener::v3::{filter, Filter, FilterChain, Listener};
use envoy_types::pb::envoy::extensions::access_loggers::file::v3::FileAccessLog;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager, HttpConnectionManager, HttpFilter, Rds,
};
use envoy_types::pb::google::protobuf::BoolValue;

use crate::groups::Group;
use crate::metadata::ListenersConfig;
use crate::snapshot::filters::any_from_message;

use super::clusters::socket_address;
use super::{ads_config_source, EGRESS_ROUTES_NAME, INGRESS_ROUTES_NAME};

const HCM_FILTER_NAME: &str = "envoy.filters.network.http_connection_manager";
const HCM_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";
const FILE_ACCESS_LOG_NAME: &str = "envoy.access_loggers.file";
const FILE_ACCESS_LOG_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.access_loggers.file.v3.FileAccessLog";
const ACCESS_LOG_PATH: &str = "/dev/stdout";

pub struct ListenerFactory;

impl ListenerFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn listeners(
        &self,
        group: &Group,
        ingress_filters: Vec<HttpFilter>,
        egress_filters: Vec<HttpFilter>,
    ) -> Vec<Listener> {
        let Some(config) = &group.listeners_config else {
            return Vec::new();
        };
        vec![
            listener(
                "ingress_listener",
                &config.ingress_host,
                config.ingress_port,
                hcm("ingress_http", INGRESS_ROUTES_NAME, ingress_filters, config),
            ),
            listener(
                "egress_listener",
                &config.egress_host,
                config.egress_port,
                hcm("egress_http", EGRESS_ROUTES_NAME, egress_filters, config),
            ),
        ]
    }
}

impl Default for ListenerFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn listener(name: &str, host: &str, port: u32, hcm: HttpConnectionManager) -> Listener {
    Listener {
        name: name.to_string(),
        address: Some(socket_address(host, port)),
        filter_chains: vec![FilterChain {
            filters: vec![Filter {
                name: HCM_FILTER_NAME.to_string(),
                config_type: Some(filter::ConfigType::TypedConfig(any_from_message(
                    HCM_TYPE_URL,
                    &hcm,
                ))),
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn hcm(
    stat_prefix: &str,
    route_config_name: &str,
    http_filters: Vec<HttpFilter>,
    config: &ListenersConfig,
) -> HttpConnectionManager {
    HttpConnectionManager {
        stat_prefix: stat_prefix.to_string(),
        codec_type: http_connection_manager::CodecType::Auto as i32,
        route_specifier: Some(http_connection_manager::RouteSpecifier::Rds(Rds {
            route_config_name: route_config_name.to_string(),
            config_source: Some(ads_config_source()),
        })),
        http_filters,
        use_remote_address: Some(BoolValue { value: config.use_remote_address }),
        access_log: if config.access_log_enabled { vec![file_access_log()] } else { Vec::new() },
        ..Default::default()
    }
}

fn file_access_log() -> AccessLog {
    let file_log = FileAccessLog { path: ACCESS_LOG_PATH.to_string(), ..Default::default() };
    AccessLog {
        name: FILE_ACCESS_LOG_NAME.to_string(),
        filter: None,
        config_type: Some(access_log::ConfigType::TypedConfig(any_from_message(
            FILE_ACCESS_LOG_TYPE_URL,
            &file_log,
        ))),
    }
}
