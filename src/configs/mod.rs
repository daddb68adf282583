pub mod base;
pub mod logging;
pub mod relay;
pub mod server;
pub mod youtube;

pub use base::*;
pub use logging::*;
pub use relay::*;
pub use server::*;
pub use youtube::*;
