//! Log streaming: doppler transport, tailing, parsing and presentation.

pub mod chug;
pub mod console;
pub mod events;
pub mod noaa;
pub mod prettify;
pub mod reader;

pub use console::{TailedLogsOutputter, format_log_message};
pub use events::{ContainerMetric, Envelope, LogMessage};
pub use noaa::{NoaaConsumer, ReconnectConfig};
pub use reader::{LogConsumer, LogReader};
