pub mod health;
pub mod sessions;
pub mod users;

pub use health::health_check;
pub use sessions::{create_session, current_user, end_session};
pub use users::{create_user, delete_user, get_user, list_users};
