pub mod domain;
pub mod error;
pub mod id;
pub mod time;
pub mod validate;

pub use domain::{
    BloodProduct, BloodType, Donation, Donor, Gender, JobStatus, ProductStatus, ScreeningResult,
    SyncState, SyncType,
};
pub use error::{CoreError, ErrorCategory, Result, ValidationError};
pub use id::generate_id;
pub use time::{Timestamp, now_utc};
