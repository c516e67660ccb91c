mod user;

pub use user::{NewUser, User, UserRole, USER_COLUMNS};
