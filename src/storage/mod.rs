pub mod lineage;
pub mod memory;
pub mod resolver;
pub mod row;

pub use lineage::{Lineage, WritePlan};
pub use memory::{InMemoryStore, LineageHandle};
pub use row::{Interval, Row, RowKey};
