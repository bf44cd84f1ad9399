pub mod customer;
pub mod ledger;
pub mod notify;
pub mod order;
pub mod payment;
pub mod payout;
pub mod referral;
pub mod settings;
pub mod stats;
#[cfg(test)]
pub mod test_utils;

pub use customer::Customer;
pub use ledger::Ledger;
pub use order::Order;
pub use payout::Payout;
pub use referral::Referral;
pub use settings::Settings;
pub use stats::Stats;
