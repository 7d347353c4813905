pub mod app;
pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod paths;
pub mod session;
pub mod status;
pub mod styles;

pub use app::PolishApp;
pub use config::{Config, ConfigManager};
pub use error::PolishError;
pub use session::SessionController;
pub use status::StatusWriter;
pub use styles::StyleId;
