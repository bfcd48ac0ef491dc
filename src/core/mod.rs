pub mod artifact;
pub mod clients;
pub mod deploy;
pub mod error;
pub mod invocation;
pub mod manifest;
pub mod poller;
pub mod record;
pub mod session;
pub mod status;
pub mod train;
