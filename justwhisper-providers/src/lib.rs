pub mod chat;
pub mod request;
pub mod runtime;
pub mod speech;
pub mod wav;

pub use chat::{build_chat_provider, ChatClientError, ChatProvider};
pub use request::{Body, HttpRequest};
pub use runtime::{execute, HttpResponse};
pub use speech::{transcribe, SpeechClientError};
pub use wav::encode_wav_mono_pcm16le;
