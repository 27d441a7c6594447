//! HTTP handlers

pub mod health;
pub mod laybuy;
pub mod orders;
pub mod payments;

pub use health::health_check;
pub use laybuy::*;
pub use orders::*;
pub use payments::*;
