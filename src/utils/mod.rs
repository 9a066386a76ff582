pub mod calendar;
pub mod jwt;
pub mod pagination;
pub mod password;
pub mod username;

pub use calendar::*;
pub use jwt::*;
pub use pagination::*;
pub use password::*;
pub use username::*;
