pub mod common;
pub mod event;
pub mod record;
pub mod user;

pub use common::*;
pub use event::*;
pub use record::*;
pub use user::*;
