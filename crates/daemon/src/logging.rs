//! Log output.
//!
//! Text format (default) writes two streams:
//!
//! ```text
//! stdout: Log: moving job to active: a.txt
//! stderr: Error: job processor failed for a.txt: ...
//! ```
//!
//! JSON format writes structured lines to stdout. `RUST_LOG` overrides the
//! default `info` filter in both formats.

use serde::Deserialize;
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `Log:` lines on stdout, `Error:`/`Warning:` lines on stderr
    #[default]
    Text,
    /// Structured JSON lines on stdout
    Json,
}

/// Formats an event as `<Prefix>: <message> [field=value ...]`
pub struct StreamFormat;

impl StreamFormat {
    fn prefix(level: &Level) -> &'static str {
        match *level {
            Level::ERROR => "Error",
            Level::WARN => "Warning",
            _ => "Log",
        }
    }
}

impl<S, N> FormatEvent<S, N> for StreamFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{}: ", Self::prefix(event.metadata().level()))?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// The two text-format layers: INFO and below to `stdout`, WARN and ERROR to
/// `stderr`
pub fn text_layers<S, O, E>(stdout: O, stderr: E) -> Vec<Box<dyn Layer<S> + Send + Sync>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    O: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let informational = tracing_subscriber::fmt::layer()
        .event_format(StreamFormat)
        .with_writer(stdout)
        .with_filter(filter_fn(|meta| *meta.level() > Level::WARN))
        .boxed();

    let errors = tracing_subscriber::fmt::layer()
        .event_format(StreamFormat)
        .with_writer(stderr)
        .with_filter(LevelFilter::WARN)
        .boxed();

    vec![informational, errors]
}

/// Install the global subscriber
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    match format {
        LogFormat::Json => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(text_layers(std::io::stdout, std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::{error, info, warn};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_text_layers_split_streams() {
        let out = Buffer::default();
        let err = Buffer::default();
        let subscriber = tracing_subscriber::registry().with(text_layers(
            {
                let out = out.clone();
                move || out.clone()
            },
            {
                let err = err.clone();
                move || err.clone()
            },
        ));

        tracing::subscriber::with_default(subscriber, || {
            info!("moving job to active: {}", "a.txt");
            warn!("something odd");
            error!("job processor failed for {}: exit 1", "a.txt");
        });

        assert_eq!(out.contents(), "Log: moving job to active: a.txt\n");
        assert_eq!(
            err.contents(),
            "Warning: something odd\nError: job processor failed for a.txt: exit 1\n"
        );
    }

    #[test]
    fn test_structured_fields_follow_message() {
        let out = Buffer::default();
        let subscriber = tracing_subscriber::registry().with(text_layers(
            {
                let out = out.clone();
                move || out.clone()
            },
            io::sink,
        ));

        tracing::subscriber::with_default(subscriber, || {
            info!(recovered_count = 2, "Crash recovery complete");
        });

        assert_eq!(out.contents(), "Log: Crash recovery complete recovered_count=2\n");
    }
}
