pub mod allocation;
pub mod commission;
pub mod customer;
pub mod order;
pub mod payout;
pub mod settings;

pub use commission::CommissionStatus;
pub use customer::PaymentMethod;
pub use order::OrderStatus;
pub use payout::PayoutStatus;
pub use settings::{PayoutFrequency, RewardType};
