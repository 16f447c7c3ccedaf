use crate::message::{Message, Method};
use bytes::{BufMut, Bytes, BytesMut};

/// Serializes an HTTP/1.0 request.
///
/// The caller's headers go out verbatim and in order. `Content-Length` is
/// synthesized for methods that carry a body unless the caller already set
/// one (any letter case), and `Connection: close` is always appended.
#[must_use]
pub fn serialize_request(method: Method, host: &str, path: &str, message: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(256 + message.body().len());

    put_line(&mut buf, &[method.as_str(), " ", path, " HTTP/1.0"]);
    put_line(&mut buf, &["Host: ", host]);

    for header in message.headers() {
        put_line(&mut buf, &[header.name(), ": ", header.value()]);
    }

    if method.carries_body() && !message.has_header("Content-Length") {
        let length = message.body().len().to_string();
        put_line(&mut buf, &["Content-Length: ", &length]);
    }

    put_line(&mut buf, &["Connection: close"]);
    buf.put_slice(b"\r\n");

    if method.carries_body() {
        buf.put_slice(message.body());
    }

    buf.freeze()
}

fn put_line(buf: &mut BytesMut, parts: &[&str]) {
    for part in parts {
        buf.put_slice(part.as_bytes());
    }
    buf.put_slice(b"\r\n");
}
