//! Port traits implemented by adapters.

pub mod config_port;
pub mod price_oracle;
pub mod price_series_port;
pub mod recorder_port;
pub mod report_port;
