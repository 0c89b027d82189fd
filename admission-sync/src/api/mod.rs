//! Target-side access: the channel trait, its ClickHouse implementation, and
//! SQL rendering

pub mod channel;
pub mod clickhouse;
#[cfg(test)]
pub mod memory;
pub mod sql;
pub mod statement;

pub use channel::{ColumnStats, TargetChannel, TargetRow};
pub use clickhouse::ClickHouseChannel;
pub use sql::SqlValue;
pub use statement::{TableRef, UpdateStatement};
