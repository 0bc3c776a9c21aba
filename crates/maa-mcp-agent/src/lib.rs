pub mod elicitation;
pub mod logging;
pub mod prompt;
pub mod server;
pub mod utils;

pub use server::{extract_content_json, MaaServer};
