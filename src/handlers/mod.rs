pub mod admin;
pub mod auth;
pub mod feedback;
pub mod surah;
pub mod user;

pub use admin::admin_config;
pub use auth::auth_config;
pub use feedback::feedback_config;
pub use surah::surah_config;
pub use user::user_config;
