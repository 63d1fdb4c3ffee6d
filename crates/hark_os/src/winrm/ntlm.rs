//! NTLMv2 client messages (MS-NLMP) and the session security that follows.
//!
//! The handshake is NEGOTIATE, CHALLENGE parsing and AUTHENTICATE with a
//! random exported session key. [`SessionSecurity`] then seals and signs
//! every message with extended session security and 128-bit RC4.

use hark_core::{HarkError, Result};
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;
use rc4::consts::U16;
use rc4::{KeyInit, Rc4, StreamCipher};

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

pub const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
pub const REQUEST_TARGET: u32 = 0x0000_0004;
pub const NEGOTIATE_SIGN: u32 = 0x0000_0010;
pub const NEGOTIATE_SEAL: u32 = 0x0000_0020;
pub const NEGOTIATE_NTLM: u32 = 0x0000_0200;
pub const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
pub const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
pub const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;
pub const NEGOTIATE_128: u32 = 0x2000_0000;
pub const NEGOTIATE_KEY_EXCH: u32 = 0x4000_0000;
pub const NEGOTIATE_56: u32 = 0x8000_0000;

pub const CLIENT_FLAGS: u32 = NEGOTIATE_UNICODE
    | REQUEST_TARGET
    | NEGOTIATE_SIGN
    | NEGOTIATE_SEAL
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY
    | NEGOTIATE_TARGET_INFO
    | NEGOTIATE_128
    | NEGOTIATE_KEY_EXCH
    | NEGOTIATE_56;

const CLIENT_SIGNING: &[u8] = b"session key to client-to-server signing key magic constant\0";
const SERVER_SIGNING: &[u8] = b"session key to server-to-client signing key magic constant\0";
const CLIENT_SEALING: &[u8] = b"session key to client-to-server sealing key magic constant\0";
const SERVER_SEALING: &[u8] = b"session key to server-to-client sealing key magic constant\0";

const AV_EOL: u16 = 0;
const AV_TIMESTAMP: u16 = 7;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET_SECS: u64 = 11_644_473_600;

/// Credentials split the way NTLM wants them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtlmIdentity {
    pub domain: String,
    pub user: String,
}

impl NtlmIdentity {
    /// `DOMAIN\user` splits into domain and user; anything else (including
    /// `user@domain`) is sent as the user name with an empty domain.
    pub fn parse(username: &str) -> Self {
        match username.split_once('\\') {
            Some((domain, user)) => Self {
                domain: domain.to_string(),
                user: user.to_string(),
            },
            None => Self {
                domain: String::new(),
                user: username.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub flags: u32,
    pub server_challenge: [u8; 8],
    pub target_info: Vec<u8>,
}

impl Challenge {
    /// Server-supplied timestamp from the target info, if present.
    pub fn timestamp(&self) -> Option<u64> {
        let mut rest = self.target_info.as_slice();
        while rest.len() >= 4 {
            let id = u16::from_le_bytes([rest[0], rest[1]]);
            let len = u16::from_le_bytes([rest[2], rest[3]]) as usize;
            if id == AV_EOL || rest.len() < 4 + len {
                break;
            }
            if id == AV_TIMESTAMP && len == 8 {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&rest[4..12]);
                return Some(u64::from_le_bytes(raw));
            }
            rest = &rest[4 + len..];
        }
        None
    }
}

pub fn negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&CLIENT_FLAGS.to_le_bytes());
    // Empty domain and workstation buffers.
    msg.extend_from_slice(&[0u8; 16]);
    msg
}

pub fn parse_challenge(bytes: &[u8]) -> Result<Challenge> {
    if bytes.len() < 48 || &bytes[..8] != SIGNATURE {
        return Err(HarkError::Authentication(
            "malformed NTLM challenge".into(),
        ));
    }
    if read_u32(bytes, 8) != 2 {
        return Err(HarkError::Authentication(
            "expected NTLM CHALLENGE message".into(),
        ));
    }

    let flags = read_u32(bytes, 20);
    let mut server_challenge = [0u8; 8];
    server_challenge.copy_from_slice(&bytes[24..32]);

    let ti_len = read_u16(bytes, 40) as usize;
    let ti_offset = read_u32(bytes, 44) as usize;
    let target_info = bytes
        .get(ti_offset..ti_offset + ti_len)
        .ok_or_else(|| HarkError::Authentication("NTLM target info out of bounds".into()))?
        .to_vec();

    Ok(Challenge {
        flags,
        server_challenge,
        target_info,
    })
}

/// MD4 of the UTF-16LE password.
pub fn nt_hash(password: &str) -> [u8; 16] {
    Md4::digest(utf16le(password)).into()
}

pub fn ntowf_v2(password: &str, user: &str, domain: &str) -> Result<[u8; 16]> {
    let identity = utf16le(&format!("{}{}", user.to_uppercase(), domain));
    hmac_md5(&nt_hash(password), &[&identity])
}

/// NTProofStr followed by the client blob.
pub fn ntlmv2_response(
    response_key: &[u8; 16],
    challenge: &Challenge,
    client_challenge: [u8; 8],
    timestamp: u64,
) -> Result<Vec<u8>> {
    let mut blob = Vec::with_capacity(28 + challenge.target_info.len() + 4);
    blob.extend_from_slice(&[1, 1, 0, 0, 0, 0, 0, 0]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&challenge.target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let proof = hmac_md5(response_key, &[&challenge.server_challenge, &blob])?;
    let mut response = proof.to_vec();
    response.extend_from_slice(&blob);
    Ok(response)
}

/// Flags the AUTHENTICATE message carries for a given CHALLENGE.
pub fn negotiated_flags(challenge_flags: u32) -> u32 {
    (challenge_flags & CLIENT_FLAGS) | NEGOTIATE_UNICODE | NEGOTIATE_NTLM
}

/// AUTHENTICATE message plus the security context it establishes.
pub struct Authenticated {
    pub message: Vec<u8>,
    pub security: SessionSecurity,
}

/// `random_session_key` becomes the exported session key when the server
/// agreed to key exchange; it travels RC4-encrypted under the session base key.
pub fn authenticate_message(
    identity: &NtlmIdentity,
    password: &str,
    challenge: &Challenge,
    client_challenge: [u8; 8],
    random_session_key: [u8; 16],
) -> Result<Authenticated> {
    let flags = negotiated_flags(challenge.flags);
    let timestamp = challenge.timestamp().unwrap_or_else(filetime_now);
    let key = ntowf_v2(password, &identity.user, &identity.domain)?;
    let nt_response = ntlmv2_response(&key, challenge, client_challenge, timestamp)?;
    let base_key = session_base_key(&key, &nt_response[..16])?;

    let (exported_key, encrypted_key) = if flags & NEGOTIATE_KEY_EXCH != 0 {
        (random_session_key, rc4_once(&base_key, &random_session_key)?.to_vec())
    } else {
        (base_key, Vec::new())
    };

    // With a server timestamp present the LM response must be zeroed.
    let lm_response = [0u8; 24];
    let domain = utf16le(&identity.domain);
    let user = utf16le(&identity.user);
    let workstation: Vec<u8> = Vec::new();

    let fields: [&[u8]; 6] = [&lm_response, &nt_response, &domain, &user, &workstation, &encrypted_key];
    let header_len = 64usize;

    let mut msg = Vec::with_capacity(header_len + fields.iter().map(|f| f.len()).sum::<usize>());
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&3u32.to_le_bytes());

    let mut offset = header_len;
    for field in &fields {
        msg.extend_from_slice(&(field.len() as u16).to_le_bytes());
        msg.extend_from_slice(&(field.len() as u16).to_le_bytes());
        msg.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += field.len();
    }
    msg.extend_from_slice(&flags.to_le_bytes());

    for field in &fields {
        msg.extend_from_slice(field);
    }

    Ok(Authenticated {
        message: msg,
        security: SessionSecurity::client(flags, exported_key)?,
    })
}

/// HMAC-MD5 of the NTProofStr under the NTLMv2 response key.
pub fn session_base_key(response_key: &[u8; 16], nt_proof: &[u8]) -> Result<[u8; 16]> {
    hmac_md5(response_key, &[nt_proof])
}

// ============================================================================
// Session security
// ============================================================================

/// One direction of a sealed conversation.
struct Direction {
    signing_key: [u8; 16],
    cipher: Rc4<U16>,
    seq: u32,
}

impl Direction {
    fn new(flags: u32, exported_key: &[u8; 16], signing: &[u8], sealing: &[u8]) -> Result<Self> {
        Ok(Self {
            signing_key: md5_concat(exported_key, signing),
            cipher: rc4(&sealing_key(flags, exported_key, sealing))?,
            seq: 0,
        })
    }

    /// Version, checksum and sequence number. The checksum goes through the
    /// same RC4 stream as the message when keys were exchanged.
    fn signature(&mut self, message: &[u8], key_exch: bool) -> Result<[u8; 16]> {
        let seq = self.seq.to_le_bytes();
        let mac = hmac_md5(&self.signing_key, &[&seq, message])?;
        let mut checksum = [0u8; 8];
        checksum.copy_from_slice(&mac[..8]);
        if key_exch {
            self.cipher.apply_keystream(&mut checksum);
        }

        let mut signature = [0u8; 16];
        signature[..4].copy_from_slice(&1u32.to_le_bytes());
        signature[4..12].copy_from_slice(&checksum);
        signature[12..].copy_from_slice(&seq);
        self.seq = self.seq.wrapping_add(1);
        Ok(signature)
    }
}

/// Sealing state for an authenticated connection. RC4 runs as one stream per
/// direction, so messages must be sealed and unsealed in wire order.
pub struct SessionSecurity {
    key_exch: bool,
    outgoing: Direction,
    incoming: Direction,
}

impl SessionSecurity {
    pub fn client(flags: u32, exported_key: [u8; 16]) -> Result<Self> {
        Self::check_flags(flags)?;
        Ok(Self {
            key_exch: flags & NEGOTIATE_KEY_EXCH != 0,
            outgoing: Direction::new(flags, &exported_key, CLIENT_SIGNING, CLIENT_SEALING)?,
            incoming: Direction::new(flags, &exported_key, SERVER_SIGNING, SERVER_SEALING)?,
        })
    }

    /// The other end of [`SessionSecurity::client`].
    #[cfg(test)]
    pub(crate) fn server(flags: u32, exported_key: [u8; 16]) -> Result<Self> {
        Self::check_flags(flags)?;
        Ok(Self {
            key_exch: flags & NEGOTIATE_KEY_EXCH != 0,
            outgoing: Direction::new(flags, &exported_key, SERVER_SIGNING, SERVER_SEALING)?,
            incoming: Direction::new(flags, &exported_key, CLIENT_SIGNING, CLIENT_SEALING)?,
        })
    }

    fn check_flags(flags: u32) -> Result<()> {
        let needed = NEGOTIATE_SEAL | NEGOTIATE_EXTENDED_SESSIONSECURITY;
        if flags & needed != needed {
            return Err(HarkError::Authentication(
                "server did not agree to NTLM message sealing".into(),
            ));
        }
        Ok(())
    }

    /// Returns the 16-byte signature and the sealed message.
    pub fn seal(&mut self, message: &[u8]) -> Result<([u8; 16], Vec<u8>)> {
        let mut sealed = message.to_vec();
        self.outgoing.cipher.apply_keystream(&mut sealed);
        let signature = self.outgoing.signature(message, self.key_exch)?;
        Ok((signature, sealed))
    }

    pub fn unseal(&mut self, signature: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
        let mut message = sealed.to_vec();
        self.incoming.cipher.apply_keystream(&mut message);
        let expected = self.incoming.signature(&message, self.key_exch)?;
        if signature != expected.as_slice() {
            return Err(HarkError::Transport("NTLM message signature mismatch".into()));
        }
        Ok(message)
    }
}

fn sealing_key(flags: u32, exported_key: &[u8; 16], magic: &[u8]) -> [u8; 16] {
    let len = if flags & NEGOTIATE_128 != 0 {
        16
    } else if flags & NEGOTIATE_56 != 0 {
        7
    } else {
        5
    };
    md5_concat(&exported_key[..len], magic)
}

fn md5_concat(key: &[u8], magic: &[u8]) -> [u8; 16] {
    let mut md5 = Md5::new();
    md5.update(key);
    md5.update(magic);
    md5.finalize().into()
}

fn rc4(key: &[u8; 16]) -> Result<Rc4<U16>> {
    Rc4::<U16>::new_from_slice(key)
        .map_err(|e| HarkError::Authentication(format!("RC4 key rejected: {e}")))
}

fn rc4_once(key: &[u8; 16], data: &[u8; 16]) -> Result<[u8; 16]> {
    let mut out = *data;
    rc4(key)?.apply_keystream(&mut out);
    Ok(out)
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16]> {
    let mut mac = <Hmac<Md5> as Mac>::new_from_slice(key)
        .map_err(|e| HarkError::Authentication(format!("HMAC-MD5 key rejected: {e}")))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn filetime_now() -> u64 {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    (since_epoch.as_secs() + FILETIME_UNIX_OFFSET_SECS) * 10_000_000
        + u64::from(since_epoch.subsec_nanos() / 100)
}

/// Server side of the handshake, for tests.
#[cfg(test)]
pub(crate) fn challenge_message(server_challenge: [u8; 8], target_info: &[u8]) -> Vec<u8> {
    let mut msg = Vec::new();
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&2u32.to_le_bytes());
    // Empty target name at the end of the header.
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&48u32.to_le_bytes());
    msg.extend_from_slice(&CLIENT_FLAGS.to_le_bytes());
    msg.extend_from_slice(&server_challenge);
    msg.extend_from_slice(&[0u8; 8]);
    msg.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
    msg.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
    msg.extend_from_slice(&48u32.to_le_bytes());
    msg.extend_from_slice(target_info);
    msg
}
