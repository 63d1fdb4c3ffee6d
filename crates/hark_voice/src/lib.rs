//! Voice input for hark
//!
//! Provides the Speech-to-Text (STT) abstraction, an HTTP transcriber for
//! OpenAI-compatible `/audio/transcriptions` endpoints, and the boundary that
//! turns recorded bytes into a file the transcriber can read.

pub mod capture;
mod http;
mod stt;

pub use capture::transcribe_recording;
pub use http::HttpTranscriber;
pub use stt::{AudioFormat, SpeechToText, Transcript};
