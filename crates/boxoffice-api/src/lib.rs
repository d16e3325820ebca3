pub mod auth;
pub mod error;
pub mod events;
pub mod middleware;
pub mod pagination;
pub mod routes;
pub mod token;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
pub use token::TokenService;
