//! CLI command handlers.

pub mod alert_types;
pub mod config;
pub mod query;
pub mod write;

pub use alert_types::run_alert_types;
pub use config::{run_config_schema, run_config_show, run_config_validate};
pub use query::{QueryCommandInput, QueryFilters, run_query};
pub use write::{PayloadSource, WriteCommandInput, run_write};
