pub mod backoff;
pub mod classify;
pub mod complete;
pub mod init;
pub mod list_models;
pub mod retry_after;
