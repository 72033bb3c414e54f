use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};

const MAX_NAME_CHARS: usize = 200;
// Most filesystems cap an entry at 255 bytes; leave room for `-N.webm`.
const MAX_NAME_BYTES: usize = 200;
const UNSAFE_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Turn an arbitrary title into something usable as a file name.
///
/// Unsafe characters become `-`, whitespace runs collapse to one space, and
/// the result is capped at 200 characters and 200 bytes. May return an empty
/// string; the caller picks the fallback.
pub fn sanitize_file_name(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '-' } else { c })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut cut = collapsed
        .char_indices()
        .nth(MAX_NAME_CHARS)
        .map_or(collapsed.len(), |(i, _)| i);
    if cut > MAX_NAME_BYTES {
        cut = MAX_NAME_BYTES;
        while !collapsed.is_char_boundary(cut) {
            cut -= 1;
        }
    }
    if cut == collapsed.len() {
        return collapsed;
    }
    // Cutting can expose a space at the end.
    collapsed[..cut].trim_end().to_string()
}

/// Container extension for a declared media type.
pub fn guess_extension(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case("audio/webm") || essence.eq_ignore_ascii_case("video/webm") {
        "webm"
    } else {
        "mp4"
    }
}

/// Create `<base>.<ext>` in `dir`, or `<base>-1.<ext>`, `<base>-2.<ext>`, ...
/// if taken. The create-new open is what reserves the name, so concurrent
/// callers never end up sharing a file.
pub async fn create_unique(dir: &Path, base: &str, ext: &str) -> io::Result<(File, PathBuf)> {
    let mut candidate = dir.join(format!("{base}.{ext}"));
    let mut n = 1u32;
    loop {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                candidate = dir.join(format!("{base}-{n}.{ext}"));
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// In-memory counterpart of [`create_unique`] for names that are only
/// reserved within one run.
pub fn claim_name(taken: &mut HashSet<String>, base: &str) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{base}-{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_clean(out: &str) {
        assert!(!out.contains(UNSAFE_CHARS), "unsafe char left in {out:?}");
        assert_eq!(out, out.trim());
        assert!(!out.contains("  "));
        assert!(out.chars().count() <= MAX_NAME_CHARS);
        assert!(out.len() <= MAX_NAME_BYTES);
    }

    #[test]
    fn replaces_unsafe_characters() {
        assert_eq!(
            sanitize_file_name(r#"AC/DC: Live? <"Best"> | a\b*"#),
            "AC-DC- Live- --Best-- - a-b-"
        );
    }

    #[test]
    fn trims_and_collapses_whitespace() {
        assert_eq!(sanitize_file_name("  Hello \t\n  World  "), "Hello World");
        assert_eq!(sanitize_file_name("   "), "");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let out = sanitize_file_name(&long);
        assert_eq!(out, "é".repeat(100));
        assert_clean(&out);
    }

    #[test]
    fn long_multibyte_title_fits_byte_budget() {
        let title = "日本語".repeat(40);
        let out = sanitize_file_name(&title);
        // 3-byte chars: 66 of them fit in 200 bytes.
        assert_eq!(out.len(), 198);
        assert!(title.starts_with(&out));
        assert_clean(&out);
        assert_eq!(sanitize_file_name(&out), out);
    }

    #[test]
    fn ascii_still_capped_at_char_limit() {
        let out = sanitize_file_name(&"a".repeat(500));
        assert_eq!(out, "a".repeat(200));
    }

    #[test]
    fn truncation_does_not_leave_trailing_space() {
        let input = format!("{} tail", "a".repeat(199));
        let out = sanitize_file_name(&input);
        assert_eq!(out, "a".repeat(199));
        assert_eq!(sanitize_file_name(&out), out);
    }

    #[test]
    fn is_idempotent_over_assorted_inputs() {
        let inputs = [
            "",
            "plain",
            "  lead and trail  ",
            "tabs\tand\nnewlines",
            "a/b\\c:d*e?f\"g<h>i|j",
            "日本語 タイトル / 2024",
            &"x y ".repeat(120),
        ];
        for input in inputs {
            let once = sanitize_file_name(input);
            assert_clean(&once);
            assert_eq!(sanitize_file_name(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn webm_types_get_webm_extension() {
        assert_eq!(guess_extension("audio/webm"), "webm");
        assert_eq!(guess_extension("video/webm"), "webm");
        assert_eq!(guess_extension("audio/webm; codecs=\"opus\""), "webm");
        assert_eq!(guess_extension("Audio/WebM"), "webm");
    }

    #[test]
    fn other_types_default_to_mp4() {
        assert_eq!(guess_extension("audio/mp4"), "mp4");
        assert_eq!(guess_extension("video/mp4; codecs=\"avc1\""), "mp4");
        assert_eq!(guess_extension(""), "mp4");
    }

    #[tokio::test]
    async fn create_unique_appends_counter() {
        let dir = tempfile::TempDir::new().unwrap();
        let (_a, first) = create_unique(dir.path(), "song", "webm").await.unwrap();
        let (_b, second) = create_unique(dir.path(), "song", "webm").await.unwrap();
        let (_c, third) = create_unique(dir.path(), "song", "webm").await.unwrap();
        assert_eq!(first, dir.path().join("song.webm"));
        assert_eq!(second, dir.path().join("song-1.webm"));
        assert_eq!(third, dir.path().join("song-2.webm"));
    }

    #[test]
    fn claim_name_suffixes_duplicates() {
        let mut taken = HashSet::new();
        assert_eq!(claim_name(&mut taken, "a"), "a");
        assert_eq!(claim_name(&mut taken, "a"), "a-1");
        assert_eq!(claim_name(&mut taken, "a"), "a-2");
        assert_eq!(claim_name(&mut taken, "b"), "b");
    }
}
