pub mod config;
pub mod decode;
pub mod doc;
pub mod scrape;

pub use decode::decode_server_status;
pub use scrape::MongoStatusSource;
