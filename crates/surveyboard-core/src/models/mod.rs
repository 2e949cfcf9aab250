//! Data models for surveyboard

pub mod category;
pub mod status;
pub mod subject;

pub use category::Category;
pub use status::{CategoryStatus, LookupOutcome, StatusRecord};
pub use subject::SubjectKey;
