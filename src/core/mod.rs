pub mod document;
pub mod error;
pub mod ids;
pub mod time;
pub mod version_correction;

pub use document::{Blob, DateWindow, Document, TimeSeries, Windowed};
pub use error::{MasterError, Result};
pub use ids::{ExternalId, IdAllocator, IdStrategy, ObjectId, UniqueId, VersionId};
pub use time::{Clock, Instant, ManualClock, SystemClock};
pub use version_correction::VersionCorrection;
