//! Streams artifact records as a single JSON array.

use std::io::Write;

use crate::error::Result;
use crate::models::ArtifactRecord;

/// Writes `[`, then one JSON object per record separated by `,\n`, then `]`.
///
/// The emitter must be the only writer of its output for the array framing
/// to hold.
pub struct ArtifactEmitter<W: Write> {
    out: W,
    first: bool,
    count: usize,
}

impl<W: Write> ArtifactEmitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            first: true,
            count: 0,
        }
    }

    /// Start the array.
    pub fn open(&mut self) -> Result<()> {
        self.out.write_all(b"[")?;
        self.out.flush()?;
        Ok(())
    }

    /// Append one record to the array.
    pub fn emit(&mut self, record: &ArtifactRecord) -> Result<()> {
        let separator: &[u8] = if self.first { b"\n" } else { b",\n" };
        self.first = false;

        self.out.write_all(separator)?;
        self.out.write_all(b"  ")?;
        serde_json::to_writer(&mut self.out, record).map_err(std::io::Error::from)?;
        self.out.flush()?;

        self.count += 1;
        Ok(())
    }

    /// Terminate the array.
    pub fn close(&mut self) -> Result<()> {
        if self.count > 0 {
            self.out.write_all(b"\n")?;
        }
        self.out.write_all(b"]\n")?;
        self.out.flush()?;
        Ok(())
    }

    /// Number of records emitted so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ArtifactRecord {
        ArtifactRecord {
            name: name.to_string(),
            mime_type: "video/mp4".to_string(),
            download_url: format!("https://x/{}", name),
        }
    }

    fn parse(bytes: Vec<u8>) -> Vec<ArtifactRecord> {
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_empty_array() {
        let mut emitter = ArtifactEmitter::new(Vec::new());
        emitter.open().unwrap();
        emitter.close().unwrap();

        let out = emitter.into_inner();
        assert_eq!(String::from_utf8(out.clone()).unwrap(), "[]\n");
        assert!(parse(out).is_empty());
    }

    #[test]
    fn test_single_record() {
        let mut emitter = ArtifactEmitter::new(Vec::new());
        emitter.open().unwrap();
        emitter.emit(&record("a.mp4")).unwrap();
        emitter.close().unwrap();

        assert_eq!(emitter.count(), 1);
        let text = String::from_utf8(emitter.into_inner()).unwrap();
        assert!(!text.contains("},"));
        assert_eq!(parse(text.into_bytes()), vec![record("a.mp4")]);
    }

    #[test]
    fn test_records_separated_by_single_comma() {
        let mut emitter = ArtifactEmitter::new(Vec::new());
        emitter.open().unwrap();
        for name in ["a", "b", "c"] {
            emitter.emit(&record(name)).unwrap();
        }
        emitter.close().unwrap();

        let text = String::from_utf8(emitter.into_inner()).unwrap();
        assert_eq!(text.matches("},\n").count(), 2);
        assert!(text.starts_with("[\n"));
        assert!(text.ends_with("\n]\n"));
        assert_eq!(
            parse(text.into_bytes()),
            vec![record("a"), record("b"), record("c")]
        );
    }

    #[test]
    fn test_names_are_escaped() {
        let tricky = ArtifactRecord {
            name: "Q3 \"review\", part\\2".to_string(),
            mime_type: "application/pdf".to_string(),
            download_url: "https://x/q?a=1&b=2".to_string(),
        };

        let mut emitter = ArtifactEmitter::new(Vec::new());
        emitter.open().unwrap();
        emitter.emit(&tricky).unwrap();
        emitter.close().unwrap();

        assert_eq!(parse(emitter.into_inner()), vec![tricky]);
    }

    #[test]
    fn test_unclosed_stream_is_not_valid_json() {
        let mut emitter = ArtifactEmitter::new(Vec::new());
        emitter.open().unwrap();
        emitter.emit(&record("a")).unwrap();

        let out = emitter.into_inner();
        assert!(serde_json::from_slice::<Vec<ArtifactRecord>>(&out).is_err());
    }
}
