pub mod url_parser;

pub use url_parser::extract_url;
