use std::path::Path;

use crate::error::ScrubError;

/// Extensions of the chapter files whose text nodes get rewritten
pub const MARKUP_EXTENSIONS: [&str; 2] = ["html", "xhtml"];

/// Checks whether a path names an HTML or XHTML chapter file
///
/// The comparison ignores ASCII case, so `Chapter.XHTML` counts as well.
pub fn is_markup_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MARKUP_EXTENSIONS
                .iter()
                .any(|markup| ext.eq_ignore_ascii_case(markup))
        })
}

/// Checks whether a path names an EPUB file by its extension
pub fn is_epub_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"))
}

/// Builds the ZIP entry name for a file inside the extracted tree
///
/// Entry names are relative to the extraction root and always use
/// forward slashes, whatever the host platform uses.
pub fn archive_entry_name(root: &Path, path: &Path) -> Result<String, ScrubError> {
    let relative_path = path.strip_prefix(root).map_err(|_| ScrubError::IOError {
        source: std::io::Error::other(format!(
            "\"{}\" is outside of \"{}\"",
            path.display(),
            root.display()
        )),
    })?;

    Ok(relative_path.to_string_lossy().replace('\\', "/"))
}

/// Shortens a pattern for log output
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut short = text.chars().take(max_chars).collect::<String>();
        short.push_str("...");
        short
    }
}

/// Lenient decoding of chapter file bytes
///
/// Chapter files are expected to be UTF-8, but real world EPUB files
/// contain all sorts of damage. Decoding never fails: a byte order mark is
/// honoured, and invalid UTF-8 sequences are replaced rather than aborting
/// the job.
pub trait DecodeBytes {
    fn decode_lossy(&self) -> String;
}

impl DecodeBytes for [u8] {
    fn decode_lossy(&self) -> String {
        match self {
            // UTF-8 BOM (0xEF, 0xBB, 0xBF)
            [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).to_string(),

            // UTF-16 BE BOM (0xFE, 0xFF)
            [0xFE, 0xFF, rest @ ..] => {
                let utf16_units: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .collect();

                String::from_utf16_lossy(&utf16_units)
            }

            // UTF-16 LE BOM (0xFF, 0xFE)
            [0xFF, 0xFE, rest @ ..] => {
                let utf16_units: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]))
                    .collect();

                String::from_utf16_lossy(&utf16_units)
            }

            _ => String::from_utf8_lossy(self).to_string(),
        }
    }
}

impl DecodeBytes for Vec<u8> {
    fn decode_lossy(&self) -> String {
        self.as_slice().decode_lossy()
    }
}
