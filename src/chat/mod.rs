pub mod fanout;
pub mod owner;
pub mod routes;
pub mod store;
