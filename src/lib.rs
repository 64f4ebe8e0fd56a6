pub mod classifier;
pub mod config;
pub mod device;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod presenter;
pub mod process;
pub mod report;
pub mod shutdown;
pub mod viewer;
