pub mod nlu;
pub mod openai_compatible;
pub mod parse;
pub mod request;
pub mod runtime;
pub mod sse;
pub mod tts;
