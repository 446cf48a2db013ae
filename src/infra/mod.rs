pub mod http;
pub mod node_api;
pub mod store;
