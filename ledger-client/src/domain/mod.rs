pub mod alert;
pub mod limits;
pub mod reading;
pub mod usage;

pub use alert::{AlertScope, AlertType, AnomalyEvent, AnomalyKind, Severity, UsageAlert};
pub use limits::{MonthlyLimit, PowerLimitSettings};
pub use reading::Reading;
pub use usage::{DailyUsageRecord, MonthlySummary, MonthlyUsageRecord};
