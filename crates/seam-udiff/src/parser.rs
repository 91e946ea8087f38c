//! Parse unified diff text into structured per-file patches.

use crate::error::ParseError;

/// Old/new path pair for one file section of a diff.
///
/// A `None` path encodes the `/dev/null` sentinel: `old_path == None` means
/// the file is being created, `new_path == None` means it is being deleted.
/// The parser guarantees at least one side is a real path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHeader {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
}

impl PatchHeader {
    /// True when this section creates a file that does not exist yet.
    pub fn is_create(&self) -> bool {
        self.old_path.is_none()
    }

    /// True when this section deletes an existing file.
    pub fn is_delete(&self) -> bool {
        self.new_path.is_none()
    }

    /// The relative path the patch effectively targets.
    ///
    /// Prefers the new path unless this is a deletion, in which case only
    /// the old path names a real file.
    pub fn effective_path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or_default()
    }
}

/// One line-level change inside a hunk, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Unchanged line, used to verify alignment with the target file.
    Context(String),
    /// Line added by the patch.
    Added(String),
    /// Line removed by the patch.
    Removed(String),
}

/// A contiguous block of changes at one location in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based first line of the hunk in the old file (0 for insertions
    /// into an empty file).
    pub old_start: usize,
    /// Number of old-file lines the hunk spans.
    pub old_count: usize,
    /// 1-based first line of the hunk in the new file.
    pub new_start: usize,
    /// Number of new-file lines the hunk spans.
    pub new_count: usize,
    /// Context/added/removed lines, preserving input order.
    pub changes: Vec<Change>,
}

/// All hunks for a single file, never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub header: PatchHeader,
    pub hunks: Vec<Hunk>,
}

/// Parser for unified diff text.
pub struct UdiffParser;

impl UdiffParser {
    /// Parse diff text into per-file patches, in input order.
    ///
    /// Recognizes standard `--- `/`+++ `/`@@` markers and tolerates the
    /// `diff --git`, `index`, mode-change and `\ No newline at end of file`
    /// lines that real git and model output carry. Paths prefixed with
    /// `a/` or `b/` have the prefix stripped.
    ///
    /// Pure function over text; no side effects.
    pub fn parse(diff_text: &str) -> Result<Vec<FilePatch>, ParseError> {
        let mut patches: Vec<FilePatch> = Vec::new();
        let mut section: Option<Section> = None;

        for line in diff_text.lines() {
            // While the current hunk still owes lines per its declared
            // counts, every line is content, never a marker. This is how
            // git and patch resolve the inherent ambiguity of removed
            // lines starting with "--" (which serialize as "--- ...") and
            // added lines starting with "++".
            if let Some(s) = section.as_mut().filter(|s| s.in_hunk_body()) {
                if line.starts_with('\\') {
                    // "\ No newline at end of file" - informational only,
                    // not counted against the hunk.
                    continue;
                }
                let change = if let Some(content) = line.strip_prefix('+') {
                    s.new_remaining = s.new_remaining.saturating_sub(1);
                    Change::Added(content.to_string())
                } else if let Some(content) = line.strip_prefix('-') {
                    s.old_remaining = s.old_remaining.saturating_sub(1);
                    Change::Removed(content.to_string())
                } else if let Some(content) = line.strip_prefix(' ') {
                    s.old_remaining = s.old_remaining.saturating_sub(1);
                    s.new_remaining = s.new_remaining.saturating_sub(1);
                    Change::Context(content.to_string())
                } else if line.is_empty() {
                    // Some producers emit blank context lines without the
                    // leading space.
                    s.old_remaining = s.old_remaining.saturating_sub(1);
                    s.new_remaining = s.new_remaining.saturating_sub(1);
                    Change::Context(String::new())
                } else {
                    return Err(ParseError::Malformed(format!(
                        "unexpected line inside hunk body: {line}"
                    )));
                };
                if let Some(hunk) = s.hunks.last_mut() {
                    hunk.changes.push(change);
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix("--- ") {
                if let Some(done) = section.take() {
                    patches.push(done.finish()?);
                }
                section = Some(Section::new(parse_path(rest)));
            } else if let Some(rest) = line.strip_prefix("+++ ") {
                match section.as_mut() {
                    Some(s) if s.new_path_seen => {
                        return Err(ParseError::Malformed(format!(
                            "duplicate +++ line: {line}"
                        )));
                    }
                    Some(s) => {
                        s.new_path = parse_path(rest);
                        s.new_path_seen = true;
                    }
                    None => {
                        return Err(ParseError::Malformed(format!(
                            "+++ line outside of a file section: {line}"
                        )));
                    }
                }
            } else if line.starts_with("@@") {
                let (old_start, old_count, new_start, new_count) = parse_hunk_header(line)
                    .ok_or_else(|| {
                        ParseError::Malformed(format!("invalid hunk header: {line}"))
                    })?;
                let s = section.as_mut().ok_or_else(|| {
                    ParseError::Malformed(format!("hunk outside of a file section: {line}"))
                })?;
                s.old_remaining = old_count;
                s.new_remaining = new_count;
                s.hunks.push(Hunk {
                    old_start,
                    old_count,
                    new_start,
                    new_count,
                    changes: Vec::new(),
                });
            }
            // Anything else ("diff --git", "index ", mode lines, prose
            // between sections) is ignored.
        }

        if let Some(done) = section.take() {
            patches.push(done.finish()?);
        }

        if patches.is_empty() {
            return Err(ParseError::Malformed(
                "no unified diff file sections found".to_string(),
            ));
        }

        Ok(patches)
    }
}

/// In-progress file section while scanning the input.
struct Section {
    old_path: Option<String>,
    new_path: Option<String>,
    new_path_seen: bool,
    hunks: Vec<Hunk>,
    old_remaining: usize,
    new_remaining: usize,
}

impl Section {
    fn new(old_path: Option<String>) -> Self {
        Self {
            old_path,
            new_path: None,
            new_path_seen: false,
            hunks: Vec::new(),
            old_remaining: 0,
            new_remaining: 0,
        }
    }

    fn in_hunk_body(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }

    fn finish(self) -> Result<FilePatch, ParseError> {
        if self.old_path.is_none() && self.new_path.is_none() {
            return Err(ParseError::Malformed(
                "file section has /dev/null on both sides".to_string(),
            ));
        }
        if self.in_hunk_body() {
            return Err(ParseError::Malformed(
                "truncated hunk: fewer body lines than the header declares".to_string(),
            ));
        }
        if !self.new_path_seen && self.hunks.is_empty() {
            // A lone "--- " line with neither a +++ counterpart nor hunks
            // is prose that happened to look like a marker.
            return Err(ParseError::Malformed(
                "file section is missing its +++ line".to_string(),
            ));
        }
        Ok(FilePatch {
            header: PatchHeader {
                old_path: self.old_path,
                new_path: self.new_path,
            },
            hunks: self.hunks,
        })
    }
}

/// Clean a `---`/`+++` path: strip git's `a/`/`b/` prefix and any trailing
/// tab-separated timestamp; map `/dev/null` to `None`.
fn parse_path(raw: &str) -> Option<String> {
    let path = raw.split('\t').next().unwrap_or(raw).trim_end();
    if path == "/dev/null" {
        return None;
    }
    let path = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path);
    Some(path.to_string())
}

/// Parse `@@ -l[,c] +l[,c] @@ ...` into `(old_start, old_count, new_start,
/// new_count)`.
fn parse_hunk_header(line: &str) -> Option<(usize, usize, usize, usize)> {
    let rest = line.strip_prefix("@@ -")?;
    let end = rest.find(" @@")?;
    let (old, new) = rest[..end].split_once(" +")?;
    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;
    Some((old_start, old_count, new_start, new_count))
}

fn parse_range(s: &str) -> Option<(usize, usize)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}
