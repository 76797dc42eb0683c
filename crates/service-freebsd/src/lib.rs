pub mod rcd;

pub use rcd::{RcD, RcDSystem};
