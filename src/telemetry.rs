use opentelemetry::global;
use opentelemetry_sdk::metrics::MeterProvider;
use tracing::info;

pub struct TelemetryConfig {
    pub enable_metrics: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
        }
    }
}

pub struct TelemetryService {
    config: TelemetryConfig,
}

impl TelemetryService {
    pub fn new(config: TelemetryConfig) -> Self {
        if config.enable_metrics {
            // Default SDK provider; readers/exporters are attached by the host
            let provider = MeterProvider::builder().build();
            global::set_meter_provider(provider);
        }

        Self { config }
    }

    pub fn metrics_enabled(&self) -> bool {
        self.config.enable_metrics
    }
}

// Convenience function to initialize telemetry with default configuration
pub fn init_telemetry() -> TelemetryService {
    init_telemetry_with_config(TelemetryConfig::default())
}

pub fn init_telemetry_with_config(config: TelemetryConfig) -> TelemetryService {
    let service = TelemetryService::new(config);

    if !service.metrics_enabled() {
        info!("Metrics collection disabled");
        return service;
    }

    crate::metrics::Metrics::init();
    info!("OpenTelemetry metrics initialized");
    service
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_metrics_installs_provider() {
        let service = init_telemetry();
        assert!(service.metrics_enabled());

        crate::metrics::Metrics::get().record_storage_operation("list", "file", 0.001);
    }

    #[test]
    fn test_disabled_metrics() {
        let service = init_telemetry_with_config(TelemetryConfig {
            enable_metrics: false,
        });
        assert!(!service.metrics_enabled());
    }
}
