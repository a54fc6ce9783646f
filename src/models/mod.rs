pub mod browser;
pub mod connection;

pub use browser::*;
pub use connection::*;
