// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Pre-flight checks on the files a student wants to submit.
//!
//! Each file gets exactly one [`Verdict`]. Directories are walked recursively
//! and every regular file inside them is checked on its own, named by its
//! path relative to the directory that was passed in.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use walkdir::WalkDir;

use crate::app::types::{FileRecord, ValidationReport, Verdict};

pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const SNIFF_LEN: usize = 8192;
const MIB: f64 = 1024.0 * 1024.0;

const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "out", "o", "obj", "zip", "rar", "7z", "tar", "gz", "bz2",
    "jpg", "jpeg", "png", "gif", "bmp", "ico", "svg", "mp3", "wav", "mp4", "avi", "mov", "mkv",
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
];

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "py", "java", "c", "cpp", "h", "hpp", "js", "html", "css", "xml", "json", "md", "rst",
];

/// Validates files and directories, returning accepted paths, rejected paths
/// and one reason per rejection.
pub fn validate_paths<P: AsRef<Path>>(paths: &[P]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for record in collect_records(paths) {
        if record.verdict.is_accepted() {
            report.accepted.push(record.path);
        } else {
            report.reasons.push(rejection_reason(&record));
            report.rejected.push(record.path);
        }
    }
    report
}

/// Expands directories and validates every file found.
pub fn collect_records<P: AsRef<Path>>(paths: &[P]) -> Vec<FileRecord> {
    let mut records = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            walk_directory(path, &mut records);
        } else {
            records.push(validate_file(path, &base_name(path)));
        }
    }
    records
}

fn walk_directory(root: &Path, records: &mut Vec<FileRecord>) {
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                let display = relative_name(root, entry.path());
                records.push(validate_file(entry.path(), &display));
            }
            Err(err) => {
                let Some(path) = err.path().map(Path::to_path_buf) else {
                    tracing::warn!("skipping unreadable entry under {}: {err}", root.display());
                    continue;
                };
                if path == root {
                    records.push(inaccessible(&path, &base_name(&path), err.to_string()));
                } else {
                    let display = relative_name(root, &path);
                    records.push(inaccessible(&path, &display, err.to_string()));
                }
            }
        }
    }
}

/// Applies the size, extension and content rules, in that order.
pub fn validate_file(path: &Path, display_name: &str) -> FileRecord {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) => return inaccessible(path, display_name, err.to_string()),
    };

    let verdict = if size > MAX_FILE_SIZE {
        Verdict::TooLarge { size }
    } else {
        match extension.as_deref() {
            Some(ext) if BINARY_EXTENSIONS.contains(&ext) => Verdict::BinaryExtension,
            Some(ext) if TEXT_EXTENSIONS.contains(&ext) => Verdict::Accepted,
            _ => sniff_content(path),
        }
    };

    FileRecord {
        path: path.to_path_buf(),
        display_name: display_name.to_string(),
        size: Some(size),
        extension,
        verdict,
    }
}

fn sniff_content(path: &Path) -> Verdict {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    let read = File::open(path).and_then(|file| file.take(SNIFF_LEN as u64).read_to_end(&mut head));
    match read {
        Ok(_) if head.contains(&0) => Verdict::BinaryContent,
        Ok(_) => Verdict::Accepted,
        Err(err) => {
            // The size check already succeeded, so keep the file.
            tracing::debug!("content sniff failed for {}: {err}", path.display());
            Verdict::Accepted
        }
    }
}

fn inaccessible(path: &Path, display_name: &str, reason: String) -> FileRecord {
    FileRecord {
        path: path.to_path_buf(),
        display_name: display_name.to_string(),
        size: None,
        extension: path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase()),
        verdict: Verdict::Inaccessible { reason },
    }
}

pub fn rejection_reason(record: &FileRecord) -> String {
    let name = &record.display_name;
    match &record.verdict {
        Verdict::Accepted => String::new(),
        Verdict::Inaccessible { reason } => format!("Cannot access file: {name} - {reason}"),
        Verdict::TooLarge { size } => format!(
            "File too large: {name} ({:.1}MB > {}MB)",
            *size as f64 / MIB,
            MAX_FILE_SIZE / (1024 * 1024)
        ),
        Verdict::BinaryExtension => format!("Binary file not allowed: {name}"),
        Verdict::BinaryContent => format!("Binary content detected: {name}"),
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| base_name(path))
}

/// Upload name for an accepted path: remote staging is flat.
pub fn upload_name(path: &Path) -> String {
    base_name(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn accepts_text_files_and_rejects_binary_extensions() {
        let dir = TempDir::new().unwrap();
        let py = write(dir.path(), "main.py", b"print('hi')\n");
        let zip = write(dir.path(), "bundle.ZIP", b"PK\x03\x04");

        let report = validate_paths(&[py.clone(), zip.clone()]);
        assert_eq!(report.accepted, vec![py]);
        assert_eq!(report.rejected, vec![zip]);
        assert_eq!(report.reasons, vec!["Binary file not allowed: bundle.ZIP"]);
    }

    #[test]
    fn nul_byte_in_unknown_extension_is_binary_content() {
        let dir = TempDir::new().unwrap();
        let blob = write(dir.path(), "data.dat", b"abc\0def");
        let plain = write(dir.path(), "Makefile", b"all:\n\tcc main.c\n");

        let report = validate_paths(&[blob.clone(), plain.clone()]);
        assert_eq!(report.accepted, vec![plain]);
        assert_eq!(report.rejected, vec![blob]);
        assert_eq!(report.reasons, vec!["Binary content detected: data.dat"]);
    }

    #[test]
    fn allowlisted_text_is_not_sniffed() {
        let dir = TempDir::new().unwrap();
        let txt = write(dir.path(), "odd.txt", b"nul\0inside");
        let report = validate_paths(&[txt.clone()]);
        assert_eq!(report.accepted, vec![txt]);
    }

    #[test]
    fn nul_byte_past_sniff_window_is_accepted() {
        let dir = TempDir::new().unwrap();
        let mut bytes = vec![b'a'; SNIFF_LEN];
        bytes.push(0);
        let late = write(dir.path(), "late.log", &bytes);
        let report = validate_paths(&[late.clone()]);
        assert_eq!(report.accepted, vec![late]);
    }

    #[test]
    fn eleven_mib_file_reports_actual_and_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.txt");
        let file = fs::File::create(&path).unwrap();
        file.set_len(11 * 1024 * 1024).unwrap();

        let report = validate_paths(&[path.clone()]);
        assert_eq!(report.rejected, vec![path]);
        assert!(report.reasons[0].contains("11.0MB"));
        assert!(report.reasons[0].contains("10MB"));
        assert!(report.reasons[0].starts_with("File too large: huge.txt"));
    }

    #[test]
    fn exactly_ten_mib_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edge.py");
        let file = fs::File::create(&path).unwrap();
        file.set_len(MAX_FILE_SIZE).unwrap();
        assert!(validate_paths(&[path]).is_clean());
    }

    #[test]
    fn missing_file_is_inaccessible() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.py");
        let report = validate_paths(&[missing.clone()]);
        assert_eq!(report.rejected, vec![missing]);
        assert!(report.reasons[0].starts_with("Cannot access file: gone.py - "));
    }

    #[test]
    fn directories_are_expanded_with_relative_names() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        let a = write(&root, "src/a.c", b"int main(){}\n");
        let img = write(&root, "assets/logo.png", b"\x89PNG");
        let b = write(&root, "README.md", b"# hw\n");

        let report = validate_paths(&[root.clone()]);
        let accepted: HashSet<_> = report.accepted.iter().cloned().collect();
        assert_eq!(accepted, HashSet::from([a, b]));
        assert_eq!(report.rejected, vec![img]);
        assert_eq!(
            report.reasons,
            vec!["Binary file not allowed: assets/logo.png"]
        );
    }

    #[test]
    fn accepted_and_rejected_partition_the_expanded_input() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("mixed");
        write(&root, "one.py", b"x = 1\n");
        write(&root, "two.bin", b"\x7fELF");
        write(&root, "nested/three.dat", b"\0\0");
        write(&root, "nested/four.java", b"class Four {}\n");
        let loose = write(dir.path(), "loose.txt", b"hello\n");

        let report = validate_paths(&[root.clone(), loose]);
        let accepted: HashSet<_> = report.accepted.iter().cloned().collect();
        let rejected: HashSet<_> = report.rejected.iter().cloned().collect();
        assert!(accepted.is_disjoint(&rejected));
        assert_eq!(accepted.len() + rejected.len(), 5);
        assert_eq!(report.rejected.len(), report.reasons.len());
    }

    #[test]
    fn records_carry_lowercased_extension_and_size() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "Main.JAVA", b"class Main {}\n");
        let record = validate_file(&path, "Main.JAVA");
        assert_eq!(record.extension.as_deref(), Some("java"));
        assert_eq!(record.size, Some(14));
        assert_eq!(record.verdict, Verdict::Accepted);
    }
}
