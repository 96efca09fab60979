mod config_cmd;
mod content;
mod store_cmd;

pub use config_cmd::ConfigCommand;
pub use content::{ContentCommand, OutputFormat};
pub use store_cmd::StoreCommand;
