pub mod alerts;
pub mod token_monitor;

pub use alerts::{AlertRules, BuyAlertPolicy};
pub use token_monitor::{MonitorConfig, MonitorHandle, RegisterOutcome, TokenMonitor};
