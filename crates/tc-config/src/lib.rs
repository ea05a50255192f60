pub mod assessment;
pub mod capture;
pub mod filtering;
pub mod logging;
pub mod storage;
pub mod twcloud;
pub mod types;
mod validate;

pub use assessment::AssessmentConfig;
pub use capture::CaptureConfig;
pub use filtering::FilteringConfig;
pub use logging::{LogFormat, LogRotation, LoggingConfig};
pub use storage::StorageConfig;
pub use twcloud::TwcloudConfig;
pub use types::{HumanDuration, SourceMode};
