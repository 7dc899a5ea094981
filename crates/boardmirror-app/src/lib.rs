pub mod config;
pub mod driver;
pub mod repair;

pub use config::AppConfig;
pub use driver::{ReconciliationDriver, RunLimits, RunReport, DEFAULT_FAILURE_LOG_CAP};
pub use repair::{
    repair_missing_creators, repair_missing_lists, CreatorRepairReport, ListRepairReport,
};
