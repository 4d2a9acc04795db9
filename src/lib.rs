// ============================================================================
// Bitemporal Document Master
// ============================================================================
//
// Versioned storage for reference documents along two time axes: when a
// version was valid (version time) and when the master learned of it
// (correction time). History is append-only; every past view can be
// reproduced exactly.
//
// ============================================================================

pub mod cache;
pub mod core;
pub mod expression;
pub mod master;
pub mod query;
pub mod registry;
pub mod source;
pub mod storage;
pub mod web;

pub use cache::{CacheStats, ReadThroughCache};
pub use core::{
    Blob, Clock, DateWindow, Document, ExternalId, IdStrategy, Instant, ManualClock, MasterError, ObjectId,
    Result, SystemClock, TimeSeries, UniqueId, VersionCorrection, VersionId, Windowed,
};
pub use master::{ChangeEvent, ChangeType, Master, MasterConfig, Replacement};
pub use query::{
    ExternalIdSearch, ExternalIdSearchType, HistoryRequest, Page, Paging, PagingRequest, SearchRequest,
    SortOrder,
};
pub use registry::{DocumentType, MasterRegistry};
pub use source::{DocumentSource, SourceQuery};
pub use storage::Row;
