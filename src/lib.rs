pub mod assembler;
pub mod config;
pub mod extract;
pub mod fetch_error;
pub mod fetcher;
pub mod header;
pub mod index;
pub mod ingest_error;
pub mod normalize;
pub mod pipeline;
pub mod resource;
pub mod robots;
pub mod schema;
pub mod selector;
pub mod sniffer;
pub mod table;
pub mod validate;
pub mod writer;
