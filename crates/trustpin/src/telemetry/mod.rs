//! Process-wide log sink.
//!
//! Records are written to stderr as
//! `TrustPin [YYYY-MM-DD HH:MM:SS] [LEVEL] <message>`, gated by a severity
//! that can be adjusted at runtime through [`set_level`].

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::Event;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::{LookupSpan, Registry};
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;

/// Severity threshold for the TrustPin log sink, ordered
/// `None < Error < Info < Debug`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
	/// Nothing is emitted.
	None,
	#[default]
	Error,
	Info,
	Debug,
}

impl From<LogLevel> for LevelFilter {
	fn from(level: LogLevel) -> Self {
		match level {
			LogLevel::None => LevelFilter::OFF,
			LogLevel::Error => LevelFilter::ERROR,
			LogLevel::Info => LevelFilter::INFO,
			LogLevel::Debug => LevelFilter::DEBUG,
		}
	}
}

impl FromStr for LogLevel {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"none" | "off" => Ok(LogLevel::None),
			"error" => Ok(LogLevel::Error),
			"info" => Ok(LogLevel::Info),
			"debug" => Ok(LogLevel::Debug),
			other => Err(format!("unknown log level {other:?}")),
		}
	}
}

impl fmt::Display for LogLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LogLevel::None => write!(f, "none"),
			LogLevel::Error => write!(f, "error"),
			LogLevel::Info => write!(f, "info"),
			LogLevel::Debug => write!(f, "debug"),
		}
	}
}

static RELOAD_HANDLE: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

/// Install the TrustPin sink as the global subscriber.
///
/// A no-op when another global subscriber is already installed (a host
/// application or a test harness); log records then flow through that
/// subscriber instead and [`set_level`] has no effect.
pub fn init(level: LogLevel) {
	let (filter, handle) = reload::Layer::new(LevelFilter::from(level));
	let sink = tracing_subscriber::fmt::layer()
		.event_format(TrustPinFormat)
		.with_writer(std::io::stderr);
	if tracing_subscriber::registry()
		.with(filter)
		.with(sink)
		.try_init()
		.is_ok()
	{
		let _ = RELOAD_HANDLE.set(handle);
	}
}

/// Adjust the process-wide severity at runtime.
pub fn set_level(level: LogLevel) {
	if let Some(handle) = RELOAD_HANDLE.get() {
		let _ = handle.reload(LevelFilter::from(level));
	}
}

struct TrustPinFormat;

impl<S, N> FormatEvent<S, N> for TrustPinFormat
where
	S: tracing::Subscriber + for<'a> LookupSpan<'a>,
	N: for<'a> FormatFields<'a> + 'static,
{
	fn format_event(
		&self,
		ctx: &FmtContext<'_, S, N>,
		mut writer: Writer<'_>,
		event: &Event<'_>,
	) -> fmt::Result {
		let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
		write!(
			writer,
			"TrustPin [{timestamp}] [{}] ",
			event.metadata().level()
		)?;
		ctx.field_format().format_fields(writer.by_ref(), event)?;
		writeln!(writer)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn severity_ordering() {
		assert!(LogLevel::None < LogLevel::Error);
		assert!(LogLevel::Error < LogLevel::Info);
		assert!(LogLevel::Info < LogLevel::Debug);
	}

	#[test]
	fn maps_to_level_filters() {
		assert_eq!(LevelFilter::from(LogLevel::None), LevelFilter::OFF);
		assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
		assert_eq!(LevelFilter::from(LogLevel::Info), LevelFilter::INFO);
		assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
	}

	#[test]
	fn parses_from_str() {
		assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
		assert_eq!("OFF".parse::<LogLevel>().unwrap(), LogLevel::None);
		assert!("verbose".parse::<LogLevel>().is_err());
	}
}
