pub mod sink;
pub mod source;

pub use sink::ReportSink;
pub use source::ArtifactSource;
