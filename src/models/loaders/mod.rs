pub mod json_loader;
pub mod toml_loader;

pub use json_loader::load_payload_file;
pub use toml_loader::{load_proxy_pool, parse_proxy_pool};
