//! # call-telemetry-domain
//!
//! Domain model for call telemetry ingestion and querying:
//!
//! - **Scopes** - `ServiceProviderSid`, `AccountSid`, `ApplicationSid`, `Scope`
//! - **Points** - `TelemetryPoint`, `FieldValue`
//! - **Schema** - `StreamKind` and the static per-stream catalog
//! - **Records** - write inputs (`CdrRecord`, `AlertRecord`, ...) and their point conversion
//! - **Alerts** - `AlertType` codes and message templates
//! - **Queries** - `QuerySpec`, `BoundQuery`, `PagedResult`
//! - **Policies** - buffer overflow and flush failure handling
//!
//! ## Dependency Rules
//!
//! - Depends only on the `shared` crate
//! - No I/O; time is always passed in

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod alert;
pub mod error;
pub mod point;
pub mod policy;
pub mod query;
pub mod record;
pub mod records;
pub mod schema;
pub mod scope;

pub use alert::{AlertContext, AlertType, format_alert_message};
pub use error::DomainError;
pub use point::{FieldValue, TelemetryPoint};
pub use policy::{FailurePolicy, OverflowPolicy};
pub use query::{
    BoundQueries, BoundQuery, Comparison, EntityKind, LooseInt, ParamValue, Predicate,
    Projection, QueryOptions, QuerySpec, RegexParam, TimeWindow, escape_regex,
    pagination_offset, quote_ident,
};
pub use record::{PagedResult, RecordValue, TelemetryRecord};
pub use records::{
    AlertRecord, CallCountRecord, CdrRecord, ExtraFields, OneOrMany, SystemAlertRecord,
    epoch_millis, parse_timestamp,
};
pub use schema::{ColumnSpec, StreamKind, StreamSchema, ValueType};
pub use scope::{AccountSid, ApplicationSid, Scope, ScopeLevel, ServiceProviderSid};
