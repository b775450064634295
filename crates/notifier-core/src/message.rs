//! FT message framing for the event bus.
//!
//! Messages are framed as a magic line, one `name: value` line per header,
//! a blank line, then the body verbatim:
//!
//! ```text
//! FTMSG/1.0
//! X-Request-Id: tid_abc123
//!
//! <body bytes>
//! ```

/// Magic line identifying the framing version.
pub const FTMSG_MAGIC: &str = "FTMSG/1.0";

/// Header carrying the per-message transaction id.
pub const TRANSACTION_ID_HEADER: &str = "X-Request-Id";

/// A single event bus message: headers plus an opaque body.
///
/// Headers are kept in insertion order. Downstream consumers key on header
/// names, not positions, so no ordering contract is implied. The body is an
/// arbitrary byte sequence carried verbatim; it is not required to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtMessage {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl FtMessage {
    pub fn new(headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serialize into the wire form.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            FTMSG_MAGIC.len()
                + 1
                + self
                    .headers
                    .iter()
                    .map(|(k, v)| k.len() + v.len() + 3)
                    .sum::<usize>()
                + 1
                + self.body.len(),
        );
        out.extend_from_slice(FTMSG_MAGIC.as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out
    }
}
