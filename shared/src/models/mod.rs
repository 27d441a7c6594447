//! Domain models for the furniture order engine

mod laybuy;
mod order;
mod payment;
mod user;

pub use laybuy::*;
pub use order::*;
pub use payment::*;
pub use user::*;
