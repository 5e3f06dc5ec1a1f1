//! Authentication: password hashing, JWT sessions, and request extractors.

pub mod current_user;
pub mod password;
pub mod session;

pub use current_user::AdminUser;
