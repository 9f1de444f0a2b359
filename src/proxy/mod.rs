pub mod accounting;
pub mod upstream;

pub use accounting::{AccountingClient, ApiError, ProfitLossQuery};
