mod signaling_service;
mod signaling_session;
mod ws_handler;

pub use signaling_service::*;
pub use signaling_session::*;
pub use ws_handler::*;
