//! Response compression filter compiler.

use envoy_types::pb::envoy::config::core::v3::TypedExtensionConfig;
use envoy_types::pb::envoy::extensions::compression::gzip::compressor::v3::Gzip;
use envoy_types::pb::envoy::extensions::filters::http::compressor::v3::{compressor, Compressor};
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::HttpFilter;
use envoy_types::pb::google::protobuf::UInt32Value;

use crate::config::SnapshotConfig;

use super::{any_from_message, http_filter, COMPRESSOR_FILTER_NAME};

pub const COMPRESSOR_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.http.compressor.v3.Compressor";
const GZIP_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.compression.gzip.compressor.v3.Gzip";
const GZIP_EXTENSION_NAME: &str = "envoy.compression.gzip.compressor";

pub struct CompressionFilterFactory {
    filter: Option<HttpFilter>,
}

impl CompressionFilterFactory {
    pub fn new(config: &SnapshotConfig) -> Self {
        let filter = config.compression.enabled.then(|| {
            let compressor = Compressor {
                compressor_library: Some(TypedExtensionConfig {
                    name: GZIP_EXTENSION_NAME.to_string(),
                    typed_config: Some(any_from_message(GZIP_TYPE_URL, &Gzip::default())),
                }),
                response_direction_config: Some(compressor::ResponseDirectionConfig {
                    common_config: Some(compressor::CommonDirectionConfig {
                        min_content_length: Some(UInt32Value {
                            value: config.compression.min_content_length,
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            };
            http_filter(COMPRESSOR_FILTER_NAME, any_from_message(COMPRESSOR_TYPE_URL, &compressor))
        });
        Self { filter }
    }

    pub fn filter(&self) -> Option<HttpFilter> {
        self.filter.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn disabled_by_default() {
        assert!(CompressionFilterFactory::new(&SnapshotConfig::default()).filter().is_none());
    }

    #[test]
    fn gzip_with_configured_threshold() {
        let mut config = SnapshotConfig::default();
        config.compression.enabled = true;
        config.compression.min_content_length = 2048;

        let filter = CompressionFilterFactory::new(&config).filter().unwrap();
        use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::http_filter::ConfigType;
        let Some(ConfigType::TypedConfig(any)) = &filter.config_type else {
            panic!("expected typed config");
        };
        let compressor =
            Compressor::decode(any.value.as_slice()).unwrap_or_else(|e| panic!("decodes: {e}"));
        assert_eq!(
            compressor.compressor_library.map(|l| l.name),
            Some(GZIP_EXTENSION_NAME.to_string())
        );
        let min = compressor
            .response_direction_config
            .and_then(|r| r.common_config)
            .and_then(|c| c.min_content_length);
        assert_eq!(min.map(|v| v.value), Some(2048));
    }
}
