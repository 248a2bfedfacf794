pub mod auth_service;
pub mod feedback_service;
pub mod user_service;
pub mod verification_store;

pub use auth_service::*;
pub use feedback_service::*;
pub use user_service::*;
pub use verification_store::*;
