mod connection;
mod error_codes;
mod mock;
mod parser;
mod urc;
