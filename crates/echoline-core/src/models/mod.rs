//! Data models for the feedback-media pipeline
//!
//! Media records and their owners, the derived fields the pipeline writes,
//! batch results, PII-free status views and the retry policy.

mod batch;
mod caller;
mod media_record;
mod owner;
mod retry_policy;
mod sentiment;
mod status;

pub use batch::*;
pub use caller::*;
pub use media_record::*;
pub use owner::*;
pub use retry_policy::*;
pub use sentiment::*;
pub use status::*;
