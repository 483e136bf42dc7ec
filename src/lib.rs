//! Per-key min/mean/max over newline-delimited `key;value` records.
//!
//! Lines are parsed into records, folded into worker-local stores in
//! parallel, merged once, and rendered as
//! `{key1=min/mean/max, key2=min/mean/max, ...}` in ordinal key order.

pub mod aggregate;
pub mod chunk;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod record;
pub mod reduce;
pub mod source;
pub mod store;

pub use aggregate::Aggregate;
pub use config::{Accumulation, EngineConfig};
pub use engine::Engine;
pub use error::{EmptyGroupError, Error, Location, MalformedRecordError, Reason, Result};
pub use format::{format_summary, round_tenths};
pub use record::{parse_record, Record};
pub use store::{merge_stores, PartialStore, Summary};
