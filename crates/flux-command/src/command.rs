use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

/// Well-known header names.
pub mod headers {
    /// Effect target. Absent means the default channel.
    pub const CHANNEL: &str = "channel";
    /// Client-chosen id echoed back in a `RECEIPT` frame.
    pub const RECEIPT: &str = "receipt";
    /// Id of the command a `RECEIPT`/`ERROR` frame answers.
    pub const RECEIPT_ID: &str = "receipt-id";
    /// Short error description in an `ERROR` frame.
    pub const MESSAGE: &str = "message";
    /// MIME type of the body.
    pub const CONTENT_TYPE: &str = "content-type";
}

/// A decoded Stomp command: verb, headers and optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
}

impl Command {
    /// Create a command with no headers and no body.
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Add a header. An existing value for `name` is replaced.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach a body. An empty body is the same as no body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    /// Insert a header unless one with the same name exists.
    ///
    /// Returns false if the header was already present (first value wins).
    pub(crate) fn insert_header_if_absent(&mut self, name: String, value: String) -> bool {
        match self.headers.entry(name) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = (!body.is_empty()).then_some(body);
    }

    /// The verb token.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Value of header `name`, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// All headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// True if header `name` is present.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// The body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The `receipt` header.
    pub fn receipt(&self) -> Option<&str> {
        self.header(headers::RECEIPT)
    }

    /// Serialize into the wire grammar (no frame delimiter).
    ///
    /// Headers are written in name order so output is deterministic.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(self.verb.as_bytes());
        dst.put_u8(b'\n');

        let mut names: Vec<&String> = self.headers.keys().collect();
        names.sort();
        for name in names {
            put_escaped(dst, name);
            dst.put_u8(b':');
            put_escaped(dst, &self.headers[name]);
            dst.put_u8(b'\n');
        }

        dst.put_u8(b'\n');
        if let Some(body) = &self.body {
            dst.put_slice(body);
        }
    }

    /// Serialize into a fresh buffer (no frame delimiter).
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf);
        buf.freeze()
    }
}

fn put_escaped(dst: &mut BytesMut, text: &str) {
    for byte in text.bytes() {
        match byte {
            b'\\' => dst.put_slice(b"\\\\"),
            b'\n' => dst.put_slice(b"\\n"),
            b'\r' => dst.put_slice(b"\\r"),
            b':' => dst.put_slice(b"\\c"),
            other => dst.put_u8(other),
        }
    }
}
