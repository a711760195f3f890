pub mod sessions;
pub mod users;

pub use sessions::CreateSessionRequest;
pub use users::{CreateUserRequest, UserResponse};
