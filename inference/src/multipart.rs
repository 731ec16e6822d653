//! Minimal multipart/form-data parsing for the predict endpoint: enough to
//! pull out the uploaded file part and its declared content type.

/// The file part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Extract the boundary token from a `Content-Type: multipart/form-data`
/// header value.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    let marker = "boundary=";
    let start = content_type.find(marker)? + marker.len();
    let rest = &content_type[start..];
    let end = rest.find(';').unwrap_or(rest.len());
    let boundary = rest[..end].trim().trim_matches('"');
    if boundary.is_empty() {
        None
    } else {
        Some(boundary.to_string())
    }
}

/// Find the first part carrying a `filename=` disposition and return it.
pub fn extract_file_part(body: &[u8], boundary: &str) -> Option<FilePart> {
    let delimiter = format!("--{boundary}");
    let delim = delimiter.as_bytes();

    let mut pos = 0usize;
    while let Some(start) = find(body, delim, pos) {
        let part_start = start + delim.len();
        // Closing delimiter is "--boundary--".
        if body[part_start..].starts_with(b"--") {
            break;
        }
        let next = find(body, delim, part_start).unwrap_or(body.len());
        if let Some(part) = parse_part(&body[part_start..next]) {
            if part.filename.is_some() {
                return Some(part);
            }
        }
        pos = next;
    }
    None
}

fn parse_part(raw: &[u8]) -> Option<FilePart> {
    // Skip the leading CRLF after the delimiter.
    let raw = raw.strip_prefix(b"\r\n").unwrap_or(raw);
    let split = find(raw, b"\r\n\r\n", 0)?;
    let headers = std::str::from_utf8(&raw[..split]).ok()?;
    let mut data = &raw[split + 4..];
    // Drop the trailing CRLF preceding the next delimiter.
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    }

    let mut filename = None;
    let mut content_type = None;
    for line in headers.lines() {
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("content-disposition:") {
            filename = header_param(line, "filename");
        } else if lower.starts_with("content-type:") {
            content_type = line.splitn(2, ':').nth(1).map(|v| v.trim().to_string());
        }
    }

    Some(FilePart {
        filename,
        content_type,
        data: data.to_vec(),
    })
}

fn header_param(line: &str, key: &str) -> Option<String> {
    let marker = format!("{key}=");
    let start = line.find(&marker)? + marker.len();
    let rest = &line[start..];
    let end = rest.find(';').unwrap_or(rest.len());
    Some(rest[..end].trim().trim_matches('"').to_string())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
