//! Line-oriented gallery persistence.
//!
//! One record per line:
//!
//! ```text
//! <id>|<rows>|<columns>|<cipher(utf8(csv(values)))>
//! ```
//!
//! Values are written with Rust's shortest round-trip float formatting, so
//! every `f32` is reconstructed bit for bit. With the default
//! [`PlainBase64`] cipher the vector field is base64 only: readable by anyone
//! who has the file.

use std::io::BufRead;
use std::path::Path;

use crate::cipher::{PlainBase64, VectorCipher};
use crate::encoding::{is_valid_id, Encoding};
use crate::error::{DecodeError, GalleryError};
use crate::gallery::{Enrolled, Gallery};

const FIELD_SEPARATOR: char = '|';
const VALUE_SEPARATOR: char = ',';

/// A record that could not be decoded and was left out of the gallery.
#[derive(Debug)]
pub struct SkippedLine {
    /// 1-based line number in the source.
    pub line: usize,
    pub error: DecodeError,
}

/// Result of a best-effort load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub gallery: Gallery,
    pub skipped: Vec<SkippedLine>,
}

/// Reads and writes galleries in the record format above.
pub struct Codec {
    cipher: Box<dyn VectorCipher>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(PlainBase64)
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").field("cipher", &self.cipher.name()).finish()
    }
}

impl Codec {
    pub fn new(cipher: impl VectorCipher + 'static) -> Self {
        Self {
            cipher: Box::new(cipher),
        }
    }

    pub fn cipher_name(&self) -> &'static str {
        self.cipher.name()
    }

    /// Format one record, without the trailing newline.
    pub fn encode_record(&self, encoding: &Encoding) -> Result<String, GalleryError> {
        if !is_valid_id(encoding.id()) {
            return Err(GalleryError::InvalidId(encoding.id().to_string()));
        }
        let csv = encoding
            .vector()
            .iter()
            .map(f32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let field = self.cipher.seal(csv.as_bytes()).map_err(|reason| GalleryError::Seal {
            id: encoding.id().to_string(),
            reason,
        })?;
        let (rows, columns) = encoding.dimensions();
        Ok(format!("{}|{rows}|{columns}|{field}", encoding.id()))
    }

    /// Parse one record. Fields past the fourth are ignored.
    pub fn decode_record(&self, line: &str) -> Result<Encoding, DecodeError> {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() < 4 {
            return Err(DecodeError::MissingFields {
                found: fields.len(),
            });
        }
        let id = fields[0];
        if id.is_empty() {
            return Err(DecodeError::EmptyId);
        }
        let rows = parse_dimension("rows", fields[1])?;
        let columns = parse_dimension("columns", fields[2])?;

        let text = String::from_utf8(self.cipher.open(fields[3].trim())?)?;
        let values = text
            .split(VALUE_SEPARATOR)
            .map(|v| v.trim().parse::<f32>().map_err(|_| DecodeError::Float(v.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Encoding::from_matrix(values, rows, columns, Some(id.to_string()))?)
    }

    /// Serialize the whole gallery, one `\n`-terminated line per encoding.
    pub fn to_text(&self, gallery: &Gallery) -> Result<String, GalleryError> {
        let mut out = String::new();
        for encoding in gallery {
            out.push_str(&self.encode_record(encoding)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Rebuild a gallery from `reader`, skipping undecodable lines.
    ///
    /// Blank lines are ignored. A trailing `\r` is stripped so files written
    /// with CRLF line endings load unchanged. An I/O error aborts the load.
    pub fn read_from(&self, reader: impl BufRead) -> Result<LoadReport, GalleryError> {
        let mut report = LoadReport::default();
        for (idx, raw) in reader.split(b'\n').enumerate() {
            let line_no = idx + 1;
            let mut raw = raw?;
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let decoded = String::from_utf8(raw)
                .map_err(DecodeError::from)
                .and_then(|line| self.decode_record(&line));
            match decoded {
                Ok(encoding) => {
                    if let Enrolled::Replaced(_) = report.gallery.enroll(encoding) {
                        tracing::debug!(line = line_no, "duplicate identity replaced an earlier record");
                    }
                }
                Err(error) => {
                    tracing::warn!(line = line_no, %error, "skipping gallery record");
                    report.skipped.push(SkippedLine {
                        line: line_no,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Overwrite `path` with the gallery.
    ///
    /// Every record is formatted before the file is opened, so an invalid
    /// record leaves the existing file untouched.
    pub fn save(&self, gallery: &Gallery, path: &Path) -> Result<(), GalleryError> {
        let text = self.to_text(gallery)?;
        std::fs::write(path, text)?;
        tracing::info!(
            path = %path.display(),
            count = gallery.len(),
            cipher = self.cipher.name(),
            "gallery saved"
        );
        Ok(())
    }

    pub fn load(&self, path: &Path) -> Result<LoadReport, GalleryError> {
        let file = std::fs::File::open(path)?;
        let report = self.read_from(std::io::BufReader::new(file))?;
        tracing::info!(
            path = %path.display(),
            count = report.gallery.len(),
            skipped = report.skipped.len(),
            "gallery loaded"
        );
        Ok(report)
    }
}

fn parse_dimension(field: &'static str, value: &str) -> Result<usize, DecodeError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DecodeError::Integer {
            field,
            value: value.to_string(),
        }),
    }
}
