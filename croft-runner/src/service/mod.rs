//! Service layer
//!
//! Services contain the runner's business logic: importing staged payloads,
//! synthesizing investor reports, and buffering job logs. They work through
//! repository traits so they can be tested against in-memory stores.

mod import;
mod log_buffer;
mod report;

// Re-export traits
pub use log_buffer::LogBufferService;
pub use report::ReportSynthesizer;

// Re-export implementations
pub use import::ImportService;
pub use log_buffer::InMemoryLogBuffer;
pub use report::FileReportSynthesizer;
