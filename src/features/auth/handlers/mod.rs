pub mod auth_handler;

pub use auth_handler::{
    __path_change_password, __path_get_me, __path_login, __path_logout, __path_refresh_token,
    __path_register, change_password, get_me, login, logout, refresh_token, register,
};
