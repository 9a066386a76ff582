pub mod auth_service;
pub mod event_service;
pub mod prize_table;

pub use auth_service::*;
pub use event_service::*;
pub use prize_table::*;
