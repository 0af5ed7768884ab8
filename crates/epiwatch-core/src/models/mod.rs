//! Data models for EpiWatch

mod alert;
mod notification;
mod outbreak;
mod user;

pub use alert::*;
pub use notification::*;
pub use outbreak::*;
pub use user::*;
