//! Fire transaction construction, fee selection and submission

mod fees;
mod gas;
mod request;
mod sender;

pub use fees::FeeSettings;
pub use request::fire_call_data;
pub use sender::{FireOutcome, TransactionSender};
