//! Filesystem tests for the log tailer
//!
//! These tests drive the tailer against real files in a temp directory,
//! simulating the writer, truncation and the archiver's rename.

#[cfg(test)]
mod tail_tests {
    use crate::tailer::LogTailer;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn append(path: &Path, content: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let mut tailer = LogTailer::new(dir.path().join("heart_rate_log.csv"));

        let batch = tailer.poll().unwrap();
        assert!(batch.lines.is_empty());
        assert!(!batch.file_present);
        assert!(!batch.rotated);
    }

    #[test]
    fn test_reads_only_appended_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        append(&path, "timestamp,device,heart_rate\n2024-01-01 08:00:00,A,70\n");

        let mut tailer = LogTailer::new(&path);
        let first = tailer.poll().unwrap();
        assert_eq!(
            first.lines,
            vec!["timestamp,device,heart_rate", "2024-01-01 08:00:00,A,70"]
        );
        assert!(first.caught_up);

        append(&path, "2024-01-01 08:00:01,A,71\n");
        let second = tailer.poll().unwrap();
        assert_eq!(second.lines, vec!["2024-01-01 08:00:01,A,71"]);
    }

    #[test]
    fn test_repoll_without_growth_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        append(&path, "2024-01-01 08:00:00,A,70\n");

        let mut tailer = LogTailer::new(&path);
        assert_eq!(tailer.poll().unwrap().lines.len(), 1);

        for _ in 0..3 {
            let batch = tailer.poll().unwrap();
            assert!(batch.lines.is_empty());
            assert!(!batch.rotated);
        }
    }

    #[test]
    fn test_partial_line_is_held_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        append(&path, "2024-01-01 08:00:00,A,70\n2024-01-01 08:00:01,A,7");

        let mut tailer = LogTailer::new(&path);
        let batch = tailer.poll().unwrap();
        assert_eq!(batch.lines, vec!["2024-01-01 08:00:00,A,70"]);
        assert_eq!(tailer.cursor().pending_len(), "2024-01-01 08:00:01,A,7".len());

        append(&path, "1\n");
        let batch = tailer.poll().unwrap();
        assert_eq!(batch.lines, vec!["2024-01-01 08:00:01,A,71"]);
        assert_eq!(tailer.cursor().pending_len(), 0);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        append(&path, "2024-01-01 08:00:00,A,70\r\n\r\n\n2024-01-01 08:00:01,A,71\r\n");

        let mut tailer = LogTailer::new(&path);
        assert_eq!(
            tailer.poll().unwrap().lines,
            vec!["2024-01-01 08:00:00,A,70", "2024-01-01 08:00:01,A,71"]
        );
    }

    #[test]
    fn test_truncation_restarts_from_zero_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        append(
            &path,
            "2024-01-01 08:00:00,A,70\n2024-01-01 08:00:01,A,71\n2024-01-01 08:00:02,A,72\n",
        );

        let mut tailer = LogTailer::new(&path);
        assert_eq!(tailer.poll().unwrap().lines.len(), 3);

        fs::write(&path, "2024-01-01 09:00:00,B,80\n").unwrap();
        let batch = tailer.poll().unwrap();
        assert!(batch.rotated);
        assert_eq!(batch.lines, vec!["2024-01-01 09:00:00,B,80"]);
        assert_eq!(tailer.cursor().offset, "2024-01-01 09:00:00,B,80\n".len() as u64);
    }

    #[test]
    fn test_rotation_discards_pending_partial_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        append(&path, "2024-01-01 08:00:00,A,70\n2024-01-01 08:00:01,A,7");

        let mut tailer = LogTailer::new(&path);
        tailer.poll().unwrap();
        assert!(tailer.cursor().pending_len() > 0);

        fs::write(&path, "x\n").unwrap();
        let batch = tailer.poll().unwrap();
        assert!(batch.rotated);
        assert_eq!(batch.lines, vec!["x"]);
    }

    #[test]
    fn test_archive_rename_then_new_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heart_rate_log.csv");
        append(&path, "2024-01-01 08:00:00,A,70\n");

        let mut tailer = LogTailer::new(&path);
        assert_eq!(tailer.poll().unwrap().lines.len(), 1);

        fs::rename(&path, dir.path().join("heart_rate_log_20240101_080001.csv")).unwrap();
        let gone = tailer.poll().unwrap();
        assert!(gone.rotated);
        assert!(!gone.file_present);
        assert!(gone.lines.is_empty());

        append(
            &path,
            "timestamp,device,heart_rate\n2024-01-01 08:00:05,A,75\n2024-01-01 08:00:06,A,76\n",
        );
        let fresh = tailer.poll().unwrap();
        assert!(!fresh.rotated);
        assert_eq!(fresh.lines.len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_replaced_file_larger_than_offset_is_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        append(&path, "2024-01-01 08:00:00,A,70\n");

        let mut tailer = LogTailer::new(&path);
        tailer.poll().unwrap();

        let staged = dir.path().join("staged.csv");
        append(
            &staged,
            "2024-01-02 08:00:00,A,60\n2024-01-02 08:00:01,A,61\n2024-01-02 08:00:02,A,62\n",
        );
        fs::rename(&staged, &path).unwrap();

        let batch = tailer.poll().unwrap();
        assert!(batch.rotated);
        assert_eq!(batch.lines.len(), 3);
        assert_eq!(batch.lines[0], "2024-01-02 08:00:00,A,60");
    }

    #[test]
    fn test_chunk_limit_spreads_reads_over_polls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let content: String = (0..10)
            .map(|i| format!("2024-01-01 08:00:{:02},A,{}\n", i, 70 + i))
            .collect();
        append(&path, &content);

        let mut tailer = LogTailer::new(&path).with_max_chunk_bytes(30);
        let mut lines = Vec::new();
        let mut polls = 0;
        loop {
            let batch = tailer.poll().unwrap();
            lines.extend(batch.lines);
            polls += 1;
            if batch.caught_up {
                break;
            }
        }

        assert!(polls > 1);
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[9], "2024-01-01 08:00:09,A,79");
    }

    #[test]
    fn test_line_without_newline_is_capped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        append(&path, "2024-01-01 08:00:00,A,70\n");
        append(&path, &"x".repeat(100));

        let mut tailer = LogTailer::new(&path).with_max_chunk_bytes(40);
        let drain = |tailer: &mut LogTailer| {
            let mut lines = Vec::new();
            let mut oversized = 0;
            loop {
                let batch = tailer.poll().unwrap();
                lines.extend(batch.lines);
                oversized += batch.oversized;
                if batch.caught_up {
                    return (lines, oversized);
                }
            }
        };

        let (lines, oversized) = drain(&mut tailer);
        assert_eq!(lines, vec!["2024-01-01 08:00:00,A,70"]);
        assert_eq!(oversized, 1);
        assert!(tailer.cursor().pending_len() <= 40);

        // the rest of the runaway line is skipped, the next row survives
        append(&path, "xxxx\n2024-01-01 08:00:01,A,71\n");
        let (lines, oversized) = drain(&mut tailer);
        assert_eq!(lines, vec!["2024-01-01 08:00:01,A,71"]);
        assert_eq!(oversized, 0);
        assert_eq!(tailer.cursor().pending_len(), 0);
    }
}
