mod appointment;
mod channel;
mod config;
mod media;
mod negotiator;
mod session;

pub use appointment::*;
pub use channel::*;
pub use config::*;
pub use media::*;
pub use negotiator::*;
pub use session::*;
