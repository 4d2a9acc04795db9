pub mod history;
pub mod paging;
pub mod search;
pub mod sort;

pub use history::HistoryRequest;
pub use paging::{Page, Paging, PagingRequest};
pub use search::{ExternalIdSearch, ExternalIdSearchType, SearchRequest};
pub use sort::{NullOrdering, SortField, SortOrder};
