pub mod error;
pub mod model;
pub mod transport;

pub use error::{CallError, Result};
pub use model::*;
pub use transport::{Connector, Link};
