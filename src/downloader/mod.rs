pub mod engine;
pub mod error;
pub mod fetcher;
pub mod job;
pub mod probe;
pub mod segment;
pub mod sink;

pub use engine::DownloadEngine;
pub use error::{DownloadError, SegmentError};
pub use fetcher::fetch_segment;
pub use job::{DownloadJob, DownloadReport, SegmentOutcome};
pub use probe::probe_size;
pub use segment::{plan_segments, Segment};
pub use sink::OutputSink;
