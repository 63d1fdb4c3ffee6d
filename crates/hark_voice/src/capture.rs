//! Audio input boundary: recorded bytes → temporary file → transcript.

use crate::stt::{AudioFormat, SpeechToText, Transcript};
use hark_core::{HarkError, Result};
use std::io::Write;

/// Write `audio` to a temporary file named with the format's extension, hand
/// the path to `stt`, and remove the file again whatever the outcome.
pub async fn transcribe_recording(
    stt: &dyn SpeechToText,
    audio: &[u8],
    format: AudioFormat,
) -> Result<Transcript> {
    if audio.is_empty() {
        return Err(HarkError::Transcription("empty recording".into()));
    }

    let mut file = tempfile::Builder::new()
        .prefix("hark-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile()
        .map_err(|e| HarkError::Transcription(format!("cannot create temp file: {e}")))?;
    file.write_all(audio)
        .and_then(|_| file.flush())
        .map_err(|e| HarkError::Transcription(format!("cannot write recording: {e}")))?;

    tracing::debug!(
        "Transcribing {} bytes via {} from {}",
        audio.len(),
        stt.provider_name(),
        file.path().display()
    );
    stt.transcribe(file.path()).await
    // `file` is dropped here, deleting it.
}
