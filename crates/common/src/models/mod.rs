mod gateway;
mod session;

pub use gateway::{AdditionalRoute, GatewayConfig};
pub use session::Session;
