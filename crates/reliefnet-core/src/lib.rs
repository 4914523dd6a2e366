pub mod clock;
pub mod error;
pub mod id;
pub mod priority;
pub mod records;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, ErrorCategory, Result};
pub use id::{generate_id, validate_id};
pub use priority::Priority;
pub use records::{CitizenReport, Disaster, GeoPoint, ResourceRecord, VerificationStatus};
