pub mod connection;
pub mod dispatcher;
pub mod session;

pub use dispatcher::Dispatcher;
