//! Location input: raw fixes in, accuracy-filtered positions out

pub mod backoff;
pub mod error;
pub mod filter;
pub mod provider;
pub mod simulate;
pub mod stream;

pub use backoff::{BackoffPolicy, RetryTracker, StreamState};
pub use error::LocationError;
pub use filter::{AccuracyFilter, FixVerdict, RejectReason};
pub use provider::{AccuracyMode, LocationProvider, PermissionState, ScriptedFix, ScriptedProvider, SubscriptionHandle};
pub use stream::{LocationStream, StreamEvent, StreamStatus};
