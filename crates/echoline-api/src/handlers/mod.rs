pub mod download;
pub mod pipeline;
pub mod retry;
pub mod status;
