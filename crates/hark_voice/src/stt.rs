//! Speech-to-Text (STT) trait definition

use async_trait::async_trait;
use hark_core::Result;
use std::path::Path;

/// Supported audio formats for STT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// WAV format
    Wav,
    /// MP3 format
    Mp3,
    /// OGG Opus (common for voice messages)
    OggOpus,
    /// WebM/Opus, what browser recorders hand back
    Webm,
    Flac,
}

impl AudioFormat {
    /// Get the MIME type for this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::OggOpus => "audio/ogg",
            Self::Webm => "audio/webm",
            Self::Flac => "audio/flac",
        }
    }

    /// File extension (without the dot) used for temporary recordings.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::OggOpus => "ogg",
            Self::Webm => "webm",
            Self::Flac => "flac",
        }
    }

    /// Guess from a file extension; unknown extensions are treated as WAV.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("mp3") => Self::Mp3,
            Some("ogg") | Some("opus") => Self::OggOpus,
            Some("webm") => Self::Webm,
            Some("flac") => Self::Flac,
            _ => Self::Wav,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
}

/// Speech-to-Text trait for transcribing audio to text
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe the audio file at `path`.
    ///
    /// Failures come back as `HarkError::Transcription` and are not retried.
    async fn transcribe(&self, path: &Path) -> Result<Transcript>;

    /// Get the name of this STT provider
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(AudioFormat::from_path(Path::new("cmd.MP3")), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_path(Path::new("cmd.opus")), AudioFormat::OggOpus);
        assert_eq!(AudioFormat::from_path(Path::new("noext")), AudioFormat::Wav);
        assert_eq!(AudioFormat::Webm.extension(), "webm");
    }
}
