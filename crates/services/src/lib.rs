#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod sessions;

pub use exam_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use error::{AppServicesError, ServiceError};

pub use sessions::{DriverConfig, ExamSessionService, SessionDriver, SessionHandle, SubmissionWorkflow};
