use crate::context::Headers;
use axum::http::StatusCode;
use std::borrow::Cow;

/// The response being produced for one request
#[derive(Debug)]
pub struct ResponseBuffer {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    touched: bool,
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Headers::new(),
            body: Vec::new(),
            touched: false,
        }
    }
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self.touched = true;
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        self.touched = true;
        &mut self.headers
    }

    /// Append raw bytes to the body
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.body.extend_from_slice(bytes.as_ref());
        self.touched = true;
        self
    }

    /// Append `line` followed by `\n`
    pub fn write_line(&mut self, line: impl AsRef<str>) -> &mut Self {
        self.write(line.as_ref());
        self.body.push(b'\n');
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Whether any stage has written status, headers or body
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// Reset to an untouched `200 OK` with no headers or body
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn into_parts(self) -> (StatusCode, Headers, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_accumulate() {
        let mut response = ResponseBuffer::new();
        assert!(!response.is_touched());

        response.write_line("A-before").write("echo").write_line(":/hello");
        assert_eq!(response.text(), "A-before\necho:/hello\n");
        assert!(response.is_touched());
    }

    #[test]
    fn clear_resets_everything() {
        let mut response = ResponseBuffer::new();
        response.set_status(StatusCode::FORBIDDEN).write("no");
        response.headers_mut().insert("x-reason", "policy");

        response.clear();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
        assert!(!response.is_touched());
    }
}
