mod auth;
mod health_check;
mod users;

pub use auth::{login, refresh, register, AuthResponse, UserResponse};
pub use health_check::health_check;
pub use users::{delete_current_user, get_current_user, get_user_by_id, logout, update_current_user};
