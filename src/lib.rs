pub mod clients;

mod app;
pub mod commands;
pub mod config;
pub mod error;

pub use app::App;
pub use commands::checkout::CheckoutOptions;
pub use commands::checkout::CheckoutSession;
pub use config::Config;
pub use error::CheckoutError;

