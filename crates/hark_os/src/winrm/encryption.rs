//! MIME framing for NTLM-sealed WS-Man messages over plain HTTP.

use hark_core::{HarkError, Result};

const BOUNDARY: &str = "Encrypted Boundary";
const PROTOCOL: &str = "application/HTTP-SPNEGO-session-encrypted";
const OCTET_STREAM: &[u8] = b"\tContent-Type: application/octet-stream\r\n";

/// `Content-Type` of a sealed request or response.
pub const CONTENT_TYPE: &str = concat!(
    "multipart/encrypted;protocol=\"application/HTTP-SPNEGO-session-encrypted\";",
    "boundary=\"Encrypted Boundary\""
);

pub fn is_encrypted(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/encrypted")
}

/// Frame a sealed message. `original_len` is the plaintext length.
pub fn wrap(original_len: usize, signature: &[u8], sealed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(256 + signature.len() + sealed.len());
    out.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\tContent-Type: {PROTOCOL}\r\n\
             \tOriginalContent: type=application/soap+xml;charset=UTF-8;Length={original_len}\r\n\
             --{BOUNDARY}\r\n"
        )
        .as_bytes(),
    );
    out.extend_from_slice(OCTET_STREAM);
    out.extend_from_slice(&(signature.len() as u32).to_le_bytes());
    out.extend_from_slice(signature);
    out.extend_from_slice(sealed);
    out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    out
}

/// Split a framed message into its signature and sealed payload.
pub fn unwrap(body: &[u8]) -> Result<(&[u8], &[u8])> {
    let length = find(body, b"Length=")
        .map(|at| &body[at + 7..])
        .and_then(|rest| {
            let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
            std::str::from_utf8(&rest[..digits]).ok()?.parse::<usize>().ok()
        })
        .ok_or_else(|| malformed("no OriginalContent length"))?;

    let start = find(body, OCTET_STREAM)
        .map(|at| at + OCTET_STREAM.len())
        .ok_or_else(|| malformed("no octet-stream part"))?;
    let closing = format!("--{BOUNDARY}--");
    let end = rfind(body, closing.as_bytes()).filter(|end| *end >= start).unwrap_or(body.len());
    let payload = &body[start..end];

    if payload.len() < 4 {
        return Err(malformed("truncated payload"));
    }
    let sig_len = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let rest = &payload[4..];
    if rest.len() < sig_len {
        return Err(malformed("truncated signature"));
    }
    let (signature, sealed) = rest.split_at(sig_len);
    if sealed.len() != length {
        return Err(malformed("length does not match OriginalContent"));
    }
    Ok((signature, sealed))
}

fn malformed(what: &str) -> HarkError {
    HarkError::Transport(format!("malformed encrypted WinRM message: {what}"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
