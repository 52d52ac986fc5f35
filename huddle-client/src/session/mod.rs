mod call_event;
mod call_session;
mod session_driver;

pub use call_event::*;
pub use call_session::*;
