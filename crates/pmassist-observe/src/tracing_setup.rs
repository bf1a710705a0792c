//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use pmassist_observe::tracing_setup::{TracingOptions, init_tracing};
//!
//! // `pmassist -v serve --otel`
//! init_tracing(&TracingOptions {
//!     verbosity: 1,
//!     json_logs: false,
//!     otel: true,
//! })
//! .unwrap();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use std::sync::OnceLock;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// How the global subscriber is assembled.
#[derive(Debug, Clone, Default)]
pub struct TracingOptions {
    /// `-v` count; only used when `RUST_LOG` is unset.
    pub verbosity: u8,
    /// Emit one JSON object per log line instead of human-readable text.
    pub json_logs: bool,
    /// Bridge spans to OpenTelemetry (stdout exporter).
    pub otel: bool,
}

/// Filter directives for a `-v` count.
pub fn default_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,pmassist_api=info,pmassist_core=info,pmassist_infra=info,tower_http=info",
        1 => "info,pmassist_api=debug,pmassist_core=debug,pmassist_infra=debug",
        _ => "trace",
    }
}

/// `RUST_LOG` when set, otherwise the directives for `verbosity`.
fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)))
}

/// Initialize the global tracing subscriber.
///
/// Logs go to stderr so `--json` command output on stdout stays parseable.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub fn init_tracing(options: &TracingOptions) -> Result<(), Box<dyn std::error::Error>> {
    let filter = env_filter(options.verbosity);

    // `Option<Layer>` is itself a layer, so disabled outputs are `None`.
    let (text_layer, json_layer) = if options.json_logs {
        let json = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE);
        (None, Some(json))
    } else {
        let text = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE);
        (Some(text), None)
    };

    let otel_layer = if options.otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("pmassist");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// No-op when OTel was not enabled.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_parse_for_every_level() {
        for verbosity in 0..=3 {
            let directives = default_directives(verbosity);
            assert!(
                EnvFilter::try_new(directives).is_ok(),
                "invalid directives for -v x{verbosity}: {directives}"
            );
        }
    }

    #[test]
    fn test_more_verbosity_is_louder() {
        assert!(default_directives(0).starts_with("warn"));
        assert!(default_directives(1).starts_with("info"));
        assert_eq!(default_directives(2), "trace");
    }

    #[test]
    fn test_shutdown_without_otel_is_noop() {
        shutdown_tracing();
    }
}
