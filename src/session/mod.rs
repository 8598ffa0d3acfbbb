//! Durable JSON-on-disk session store (§4.1).

pub mod store;

pub use store::JsonSessionStore;
