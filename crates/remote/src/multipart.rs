//! `multipart/form-data` framing for single-file uploads.

use uuid::Uuid;

/// Form field the server reads the uploaded file from.
pub const FILE_FIELD: &str = "file";
pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown";

/// A fully framed request body plus the boundary it was framed with.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    pub boundary: String,
    pub bytes: Vec<u8>,
}

impl MultipartBody {
    /// Frames `content` as the only part of a form, under [`FILE_FIELD`].
    pub fn single_file(file_name: &str, content_type: &str, content: &[u8]) -> Self {
        let boundary = format!("----lettavault{}", Uuid::new_v4().simple());
        let mut bytes = Vec::with_capacity(content.len() + 256);
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        bytes.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{FILE_FIELD}\"; filename=\"{}\"\r\n",
                escape_quoted(file_name)
            )
            .as_bytes(),
        );
        bytes.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        bytes.extend_from_slice(content);
        bytes.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Self { boundary, bytes }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

// Percent-escape the characters that would break out of a quoted header value.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
