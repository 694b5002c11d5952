pub mod connection;
pub mod fanout;
pub mod presence;
