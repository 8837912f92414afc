pub mod call;
pub mod capture;
pub mod machine;
pub mod playback;
pub mod resolver;
pub mod tone;
pub mod traits;
