//! Domain model (tasks, attempts, outcomes, identities, errors).

pub mod attempt;
pub mod duration;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod outcome;
pub mod payload;
pub mod task;

pub use attempt::AttemptContext;
pub use duration::{DurationParseError, format_duration, parse_duration};
pub use errors::{ErrorKind, ProbeError};
pub use identity::{IdentitySnapshot, OriginMatch, ServiceIdentity};
pub use ids::{RequestId, TaskId};
pub use outcome::{Outcome, OutcomeKind};
pub use payload::FormPayload;
pub use task::{TaskHandle, TaskRequest};
