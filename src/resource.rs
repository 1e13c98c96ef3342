use std::borrow::Cow;
use std::path::Path;

use encoding_rs::{Encoding, WINDOWS_1252};

/// A downloaded resource as handed to the ingestion pipeline.
///
/// Immutable once fetched: the pipeline only ever borrows it.
#[derive(Debug, Clone)]
pub struct RawResource {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl RawResource {
    pub fn new(url: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            content_type,
            bytes,
        }
    }

    /// Build a resource from a local file; the path stands in for the URL
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self::new(path.to_string_lossy(), None, bytes))
    }

    /// Lowercase extension of the URL path, ignoring query and fragment.
    ///
    /// Only ever a hint: the sniffer decides the real format.
    pub fn declared_extension(&self) -> Option<String> {
        let path = match url::Url::parse(&self.url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => self
                .url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        let file_name = path.rsplit(['/', '\\']).next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

/// Decode a text payload: BOM first, then strict UTF-8, then Windows-1252.
///
/// Windows-1252 never fails, so callers that need to reject binary data must
/// inspect the decoded text themselves.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_extension_from_url() {
        let res = RawResource::new(
            "https://www.bps.gub.uy/bps/file/123/1/iii_3_subsidio.XLS?download=1",
            None,
            vec![],
        );
        assert_eq!(res.declared_extension().as_deref(), Some("xls"));
    }

    #[test]
    fn test_declared_extension_missing() {
        let res = RawResource::new("https://www.bps.gub.uy/cuadro.jsp", None, vec![]);
        assert_eq!(res.declared_extension().as_deref(), Some("jsp"));

        let res = RawResource::new("https://www.bps.gub.uy/descarga/", None, vec![]);
        assert_eq!(res.declared_extension(), None);
    }

    #[test]
    fn test_declared_extension_local_path() {
        let res = RawResource::new("/tmp/recaudacion.xlsx", None, vec![]);
        assert_eq!(res.declared_extension().as_deref(), Some("xlsx"));
    }

    #[test]
    fn test_decode_text_utf8_bom() {
        let bytes = b"\xEF\xBB\xBFFecha;Total";
        assert_eq!(decode_text(bytes), "Fecha;Total");
    }

    #[test]
    fn test_decode_text_windows_1252() {
        // "Recaudación" with 0xF3 for ó
        let bytes = b"Recaudaci\xF3n";
        assert_eq!(decode_text(bytes), "Recaudación");
    }
}
