//! 统一可观测性模块
//!
//! 提供 logging 与 metrics 的统一初始化。服务通过单一入口点配置，
//! 确保一致的日志格式和指标命名。

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::ObservabilityConfig;

/// 初始化日志与指标
///
/// 日志级别优先使用 RUST_LOG 环境变量，其次使用配置中的 log_level。
/// metrics_enabled 为 true 时在 metrics_port 上暴露 Prometheus 拉取端点。
pub async fn init(config: &ObservabilityConfig) -> Result<()> {
    init_tracing(config)?;

    if config.metrics_enabled {
        init_metrics(config.metrics_port)?;
        describe_metrics();
    }

    info!(
        log_level = %config.log_level,
        log_format = %config.log_format,
        metrics_enabled = config.metrics_enabled,
        "Observability initialized"
    );

    Ok(())
}

/// 初始化 tracing 日志
fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if config.log_format == "json" {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// 初始化 Prometheus 指标导出器
fn init_metrics(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    Ok(())
}

/// 预声明核心业务指标，保证即使尚未产生数据也能在 /metrics 中可见
fn describe_metrics() {
    metrics::describe_counter!(
        "qr_tokens_issued_total",
        "Total number of QR tokens issued"
    );
    metrics::describe_counter!(
        "qr_tokens_revoked_total",
        "Total number of QR tokens explicitly revoked"
    );
    metrics::describe_counter!(
        "qr_redemptions_total",
        "Total number of redemption attempts by outcome"
    );
    metrics::describe_histogram!(
        "qr_redemption_duration_seconds",
        "Redemption processing latency in seconds"
    );
}
