pub mod report;
pub mod repository;
pub mod sample;

pub use report::{DeliveryStatus, DeltaReport, RunOutcome, SkippedRepository, Stage};
pub use repository::{EnumerationRule, TrackedRepository};
pub use sample::CountSample;
