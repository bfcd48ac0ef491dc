pub mod gateway;
pub mod metadata;
pub mod pipeline;
pub mod platform;
pub mod storage;
