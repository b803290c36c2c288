pub mod daily;
pub mod monthly;

pub use daily::DailyLedger;
pub use monthly::MonthlyLedger;
