//! Bounded output capture and diagnostic cleanup

use tokio::io::{AsyncRead, AsyncReadExt};

/// Read until EOF or until more than `cap` bytes arrived.
///
/// Returns the first `cap` bytes and whether the stream was cut short. The
/// reader is not drained past the cap.
pub async fn read_capped<R>(reader: R, cap: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader.take(cap as u64 + 1).read_to_end(&mut buf).await?;

    let truncated = buf.len() > cap;
    buf.truncate(cap);
    Ok((buf, truncated))
}

/// What happens once a stream passes its capture limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Stop the program; runaway test output
    Kill,
    /// Keep reading and drop the excess so the program can finish
    Discard,
}

/// Read until EOF, keeping only the first `cap` bytes.
///
/// Unlike [`read_capped`] the writer is never left blocked on a full pipe.
pub async fn read_draining<R>(mut reader: R, cap: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(buf.len());
        if n > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok((buf, truncated))
}

/// Shorten `text` to at most `max_chars` characters, marking the cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}... (truncated)", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Make toolchain output safe to show: strip the workspace location and bound
/// the length
pub fn sanitize_diagnostic(text: &str, workspace: &str, max_chars: usize) -> String {
    let workspace = workspace.trim_end_matches('/');
    let cleaned = if workspace.is_empty() {
        text.to_string()
    } else {
        text.replace(&format!("{}/", workspace), "")
            .replace(workspace, ".")
    };
    truncate_chars(cleaned.trim(), max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_capped_under_limit() {
        let (bytes, truncated) = read_capped(&b"hello"[..], 16).await.unwrap();
        assert_eq!(bytes, b"hello");
        assert!(!truncated);
    }

    #[tokio::test]
    async fn test_read_capped_exact_limit_is_not_truncated() {
        let (bytes, truncated) = read_capped(&b"hello"[..], 5).await.unwrap();
        assert_eq!(bytes, b"hello");
        assert!(!truncated);
    }

    #[tokio::test]
    async fn test_read_capped_over_limit() {
        let data = vec![b'x'; 100];
        let (bytes, truncated) = read_capped(&data[..], 10).await.unwrap();
        assert_eq!(bytes.len(), 10);
        assert!(truncated);
    }

    #[tokio::test]
    async fn test_read_draining_consumes_everything() {
        let data = vec![b'w'; 50_000];
        let mut reader = &data[..];
        let (bytes, truncated) = read_draining(&mut reader, 100).await.unwrap();
        assert_eq!(bytes.len(), 100);
        assert!(truncated);
        assert!(reader.is_empty());

        let (bytes, truncated) = read_draining(&b"ok"[..], 100).await.unwrap();
        assert_eq!(bytes, b"ok");
        assert!(!truncated);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé... (truncated)");
    }

    #[test]
    fn test_sanitize_strips_workspace_paths() {
        let raw = "/tmp/arenajudge-x1/solution.cpp:3:5: error: expected ';'\n";
        let cleaned = sanitize_diagnostic(raw, "/tmp/arenajudge-x1", 100);
        assert_eq!(cleaned, "solution.cpp:3:5: error: expected ';'");
        assert!(!cleaned.contains("/tmp"));
    }
}
