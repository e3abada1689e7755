pub mod classify;
pub mod engine;
pub mod io;
pub mod model;
pub mod request;
pub mod stats;
pub mod store;
