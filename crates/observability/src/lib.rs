//! Tracing and logging setup shared by every storefront entry point.

pub mod tracing;

pub use self::tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide logging.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init(format: LogFormat) {
    self::tracing::init(format);
}
