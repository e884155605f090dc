//! HTTP gateway: health check, named query agents and arXiv research behind
//! optional bearer auth.

mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use handlers::ServiceResponse;
pub use server::GatewayServer;
