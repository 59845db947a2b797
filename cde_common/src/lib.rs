mod money;

pub use money::{Currency, Money, MoneyError};
