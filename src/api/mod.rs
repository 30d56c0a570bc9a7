pub mod error;
pub mod handlers;
pub mod page;
pub mod server;
pub mod session;

pub use error::ApiError;
pub use server::{create_router, serve, AppState};
pub use session::Session;
