pub mod account;

pub use account::{AccountRecord, PendingReset};
