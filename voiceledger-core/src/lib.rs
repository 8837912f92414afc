pub mod account;
pub mod category;
pub mod config;
pub mod text;
pub mod types;

// Keep the public surface small and intentional.
pub use account::*;
pub use category::*;
pub use config::*;
pub use text::*;
pub use types::*;
