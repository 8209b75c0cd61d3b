pub mod bind;
pub mod deferred;
pub mod err;
pub mod policy;
pub mod state;
pub mod sync;

pub use crate::bind::Force;
pub use crate::deferred::Deferred;
pub use crate::err::ForceError;
pub use crate::policy::{FailurePolicy, ParsePolicyError};
pub use crate::state::Status;
pub use crate::sync::SyncDeferred;
