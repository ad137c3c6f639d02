use std::collections::HashMap;

use kestrel_core::{FileId, LineIndex, Position, Range, TextRange, TextSize};

fn file_id_for_fixture_path(path: &str) -> FileId {
    let path = path.trim().replace('\\', "/");
    let normalized = if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    };
    FileId::new(format!("file://{}", encode_uri_path(&normalized)))
}

fn encode_uri_path(path: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(path.len());
    for &b in path.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'/' | b':') {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

/// Extracts a byte range selection from a fixture containing `/*start*/` and
/// `/*end*/` markers.
///
/// Returns the fixture with markers removed and the selection `TextRange`
/// pointing at the extracted region.
pub fn extract_range(fixture: &str) -> (String, TextRange) {
    let start_marker = "/*start*/";
    let end_marker = "/*end*/";

    let start = fixture
        .find(start_marker)
        .expect("fixture missing /*start*/ marker");
    let after_start = start + start_marker.len();
    let end = fixture
        .find(end_marker)
        .expect("fixture missing /*end*/ marker");
    assert!(end >= after_start, "/*end*/ must come after /*start*/");

    let mut text = String::with_capacity(fixture.len());
    text.push_str(&fixture[..start]);
    text.push_str(&fixture[after_start..end]);
    text.push_str(&fixture[end + end_marker.len()..]);

    let range = TextRange::new(
        TextSize::from(start as u32),
        TextSize::from((end - start_marker.len()) as u32),
    );
    (text, range)
}

/// Extracts a cursor offset from a fixture containing one `/*caret*/` marker.
pub fn extract_cursor(fixture: &str) -> (String, TextSize) {
    let marker = "/*caret*/";
    let offset = fixture
        .find(marker)
        .expect("fixture missing /*caret*/ marker");

    let mut text = String::with_capacity(fixture.len());
    text.push_str(&fixture[..offset]);
    text.push_str(&fixture[offset + marker.len()..]);
    (text, TextSize::from(offset as u32))
}

/// UTF-16 position of a byte offset in `text`.
pub fn position_at(text: &str, offset: TextSize) -> Position {
    LineIndex::new(text).position(text, offset)
}

/// UTF-16 range of a byte range in `text`.
pub fn range_of(text: &str, range: TextRange) -> Range {
    LineIndex::new(text).range(text, range)
}

/// A multi-file fixture with `$0`, `$1`, ... markers.
///
/// ```text
/// //- /pkg/mod.py
/// def $0helper(): ...
/// //- /main.py
/// from pkg.mod import helper
/// ```
///
/// Paths become `file://` URIs. Marker IDs must be unique across the entire
/// fixture.
#[derive(Debug, Clone)]
pub struct Fixture {
    files: Vec<(FileId, String)>,
    markers: HashMap<u32, (FileId, usize)>,
}

impl Fixture {
    #[must_use]
    pub fn parse(fixture: &str) -> Self {
        let mut current_path: Option<String> = None;
        let mut current_text = String::new();
        let mut raw_files: Vec<(FileId, String)> = Vec::new();

        for line in fixture.lines() {
            if let Some(rest) = line.strip_prefix("//-") {
                // Text before the first header is ignored.
                let text = std::mem::take(&mut current_text);
                if let Some(path) = current_path.take() {
                    raw_files.push((file_id_for_fixture_path(&path), text));
                }
                current_path = Some(rest.trim().to_string());
                continue;
            }

            current_text.push_str(line);
            current_text.push('\n');
        }

        if let Some(path) = current_path.take() {
            raw_files.push((file_id_for_fixture_path(&path), current_text));
        }

        let mut files = Vec::with_capacity(raw_files.len());
        let mut markers: HashMap<u32, (FileId, usize)> = HashMap::new();
        for (file, text) in raw_files {
            let (text, file_markers) = strip_markers(&text);
            for (id, offset) in file_markers {
                if let Some((prev, prev_offset)) = markers.insert(id, (file.clone(), offset)) {
                    panic!(
                        "duplicate fixture marker ${id} (first at {prev}:{prev_offset}, again at {file}:{offset})"
                    );
                }
            }
            files.push((file, text));
        }

        Self { files, markers }
    }

    /// Files in fixture order.
    pub fn files(&self) -> impl Iterator<Item = (&FileId, &str)> {
        self.files.iter().map(|(file, text)| (file, text.as_str()))
    }

    #[must_use]
    pub fn file(&self, path: &str) -> FileId {
        file_id_for_fixture_path(path)
    }

    #[must_use]
    pub fn text(&self, file: &FileId) -> &str {
        self.files
            .iter()
            .find(|(id, _)| id == file)
            .map(|(_, text)| text.as_str())
            .unwrap_or_else(|| panic!("fixture has no file {file}"))
    }

    #[must_use]
    pub fn marker_file(&self, id: u32) -> FileId {
        self.marker(id).0.clone()
    }

    #[must_use]
    pub fn marker_offset(&self, id: u32) -> usize {
        self.marker(id).1
    }

    #[must_use]
    pub fn marker_position(&self, id: u32) -> Position {
        let (file, offset) = self.marker(id);
        position_at(self.text(file), TextSize::from(*offset as u32))
    }

    fn marker(&self, id: u32) -> &(FileId, usize) {
        self.markers
            .get(&id)
            .unwrap_or_else(|| panic!("fixture has no marker ${id}"))
    }
}

fn strip_markers(text: &str) -> (String, Vec<(u32, usize)>) {
    let mut out = String::with_capacity(text.len());
    let mut markers = Vec::new();

    let bytes = text.as_bytes();
    let mut i = 0usize;
    let mut last = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }

            if j > i + 1 {
                out.push_str(&text[last..i]);
                let id: u32 = text[i + 1..j].parse().expect("marker id fits in u32");
                markers.push((id, out.len()));
                i = j;
                last = j;
                continue;
            }
        }

        i += 1;
    }

    out.push_str(&text[last..]);
    (out, markers)
}
