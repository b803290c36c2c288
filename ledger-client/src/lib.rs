pub mod db;
pub mod domain;
pub mod error;
pub mod month;

pub use error::StoreError;
pub use month::MonthYear;
