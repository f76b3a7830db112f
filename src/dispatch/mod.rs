pub mod catalog;
pub mod sink;
pub mod status;
pub mod worker;

pub use catalog::CatalogReport;
pub use catalog::ManifestSource;
pub use catalog::Sample;
pub use catalog::SampleDescriptor;
pub use catalog::SamplePair;
pub use catalog::SegmentEnumerator;
pub use catalog::WorkCatalog;

pub use sink::Finalizer;
pub use sink::FsOutputSink;
pub use sink::OutputSink;

pub use status::SegmentStatus;
pub use status::SegmentStatusTable;
pub use status::StatusGuard;

pub use worker::Dispatcher;
pub use worker::RunSummary;
pub use worker::SampleSummary;
pub use worker::SegmentRunner;
pub use worker::WorkerOutcome;
pub use worker::WorkerReport;
