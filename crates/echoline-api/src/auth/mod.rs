pub mod middleware;
pub mod models;

pub use middleware::{issue_token, AuthState};
pub use models::{AuthContext, JwtClaims};
