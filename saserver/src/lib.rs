pub mod logs;
pub mod routes;
pub mod server;
pub mod signature;

pub use logs::{LogError, LogHandle, init_logging};
pub use routes::{doorbell_router, incident_router};
pub use server::Server;
pub use signature::{AuthError, SIGNATURE_HEADER};
