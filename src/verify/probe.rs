//! Single download attempt: drain the body, count bytes, sniff content kind.

use futures_util::StreamExt;

use crate::record::ContentKind;
use crate::remote::{FetchError, ObjectFetcher};

/// What one successful attempt observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    /// Total bytes read from the body.
    pub bytes_read: u64,
    /// `Binary` if any chunk contained a null byte.
    pub content_kind: ContentKind,
}

/// Downloads `cid` in full, discarding the body.
///
/// # Errors
///
/// Returns the [`FetchError`] from starting the download or from the first
/// failing chunk.
pub async fn probe(fetcher: &dyn ObjectFetcher, cid: &str) -> Result<ProbeResult, FetchError> {
    let mut stream = fetcher.fetch(cid).await?;
    let mut bytes_read = 0u64;
    let mut saw_null = false;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        bytes_read += chunk.len() as u64;
        if !saw_null {
            saw_null = chunk.contains(&0);
        }
    }

    Ok(ProbeResult {
        bytes_read,
        content_kind: if saw_null {
            ContentKind::Binary
        } else {
            ContentKind::Text
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;

    use crate::remote::ByteStream;

    struct Chunks(Vec<Result<&'static [u8], &'static str>>);

    #[async_trait]
    impl ObjectFetcher for Chunks {
        async fn fetch(&self, _cid: &str) -> Result<ByteStream, FetchError> {
            let items: Vec<_> = self
                .0
                .iter()
                .map(|chunk| match chunk {
                    Ok(bytes) => Ok(Bytes::from_static(bytes)),
                    Err(message) => Err(FetchError::Stream((*message).to_string())),
                })
                .collect();
            Ok(stream::iter(items).boxed())
        }
    }

    #[tokio::test]
    async fn test_probe_text_body() {
        let fetcher = Chunks(vec![Ok(b"hello "), Ok(b"world")]);
        let result = probe(&fetcher, "bafy").await.unwrap();
        assert_eq!(result.bytes_read, 11);
        assert_eq!(result.content_kind, ContentKind::Text);
    }

    #[tokio::test]
    async fn test_probe_null_byte_in_later_chunk_is_binary() {
        let fetcher = Chunks(vec![Ok(b"PK"), Ok(&[3, 0, 4])]);
        let result = probe(&fetcher, "bafy").await.unwrap();
        assert_eq!(result.bytes_read, 5);
        assert_eq!(result.content_kind, ContentKind::Binary);
    }

    #[tokio::test]
    async fn test_probe_empty_body_is_text() {
        let result = probe(&Chunks(vec![]), "bafy").await.unwrap();
        assert_eq!(result.bytes_read, 0);
        assert_eq!(result.content_kind, ContentKind::Text);
    }

    #[tokio::test]
    async fn test_probe_stream_error_fails_attempt() {
        let fetcher = Chunks(vec![Ok(b"part"), Err("connection reset")]);
        let error = probe(&fetcher, "bafy").await.unwrap_err();
        assert_eq!(error.to_string(), "stream interrupted: connection reset");
    }
}
