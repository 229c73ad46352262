//! Subscriber domain - The record managed by the console

mod balance;
mod entity;
mod filter;

pub use balance::{format_balance, parse_balance};
pub use entity::{property, Subscriber};
pub use filter::{SubscriberFilter, PREFIX_SENTINEL};
