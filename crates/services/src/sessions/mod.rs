mod driver;
mod service;
mod submission;

// Public API of the session subsystem.
pub use driver::{DriverConfig, SessionDriver, SessionHandle};
pub use service::ExamSessionService;
pub use submission::SubmissionWorkflow;
