pub mod builder;
pub mod chat;
pub mod config_store;
pub mod defaults;
pub mod fsutil;
pub mod ledger;
pub mod nlu;
pub mod secrets;
pub mod tts;
