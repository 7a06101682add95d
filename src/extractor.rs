use crate::config::Config;
use crate::error::ExtractError;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One context line, labeled with the rule whose match pulled it into the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLine {
    pub label: String,
    pub line_no: usize,
    pub text: String,
}

impl fmt::Display for AnnotatedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.text)
    }
}

pub struct Extractor {
    config: Config,
}

impl Extractor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Scans `path` and prints a message for every reason it could not be processed.
    ///
    /// `None` means the file was never scanned; `Some(vec![])` means it was scanned and nothing matched.
    pub fn load(&self, path: Option<&Path>) -> Option<Vec<AnnotatedLine>> {
        let Some(path) = path else {
            println!("Usage: {} <LOG_FILE>", env!("CARGO_PKG_NAME"));
            return None;
        };

        match self.extract(path) {
            Ok(lines) => Some(lines),
            Err(e) => {
                println!("{e}");
                None
            }
        }
    }

    pub fn extract(&self, path: &Path) -> Result<Vec<AnnotatedLine>, ExtractError> {
        if !path.is_file() {
            return Err(ExtractError::NotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let contents = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = contents.lines().collect();
        debug!(path = %path.display(), lines = lines.len(), "read log file");

        Ok(self.extract_lines(&lines))
    }

    pub fn extract_lines(&self, lines: &[&str]) -> Vec<AnnotatedLine> {
        let rules = &self.config.rules;
        let mut matches: Vec<Vec<usize>> = vec![Vec::new(); rules.len()];

        for (i, line) in lines.iter().enumerate() {
            let lower = line.to_lowercase();
            if let Some(rule) = rules.iter().position(|r| lower.contains(&r.trigger)) {
                matches[rule].push(i);
            }
        }

        let mut out = Vec::new();
        for (rule, positions) in rules.iter().zip(&matches) {
            for &i in positions {
                let start = i.saturating_sub(self.config.prelines);
                let end = lines.len().min(i + self.config.postlines + 1);
                debug!(label = %rule.label, line = i, start, end, "match");

                out.extend((start..end).map(|n| AnnotatedLine {
                    label: rule.label.clone(),
                    line_no: n,
                    text: lines[n].to_string(),
                }));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordRule;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn extractor(prelines: usize, postlines: usize) -> Extractor {
        Extractor::new(Config::default().with_context(prelines, postlines))
    }

    fn positions(lines: &[AnnotatedLine]) -> Vec<(&str, usize)> {
        lines.iter().map(|l| (l.label.as_str(), l.line_no)).collect()
    }

    #[test]
    fn overlapping_windows_are_emitted_twice() {
        let lines = ["boot", "disk error", "retrying", "low memory WARNING", "done"];
        let out = extractor(1, 1).extract_lines(&lines);

        assert_eq!(
            positions(&out),
            [
                ("Error", 0),
                ("Error", 1),
                ("Error", 2),
                ("Warning", 2),
                ("Warning", 3),
                ("Warning", 4),
            ]
        );
        assert_eq!(out[2].to_string(), "Error: retrying");
        assert_eq!(out[3].to_string(), "Warning: retrying");
    }

    #[test]
    fn windows_clip_at_file_boundaries() {
        let mut lines: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
        lines[0] = "error at start".into();
        lines[29] = "error at end".into();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let out = extractor(10, 10).extract_lines(&refs);
        let nos: Vec<usize> = out.iter().map(|l| l.line_no).collect();

        let expected: Vec<usize> = (0..=10).chain(19..=29).collect();
        assert_eq!(nos, expected);
        assert!(out.iter().all(|l| l.label == "Error"));
    }

    #[test]
    fn first_rule_wins_when_a_line_has_several_triggers() {
        let lines = ["Critical exception and an Error"];
        let out = extractor(0, 0).extract_lines(&lines);
        assert_eq!(positions(&out), [("Error", 0)]);

        let reordered = Extractor::new(Config::default().with_context(0, 0).with_rules(vec![
            KeywordRule::new("exception", "Exception"),
            KeywordRule::new("error", "Error"),
        ]));
        assert_eq!(positions(&reordered.extract_lines(&lines)), [("Exception", 0)]);
    }

    #[test]
    fn groups_by_rule_then_position() {
        let lines = ["warning a", "error b", "warning c", "error d"];
        let out = extractor(0, 0).extract_lines(&lines);
        assert_eq!(
            positions(&out),
            [("Error", 1), ("Error", 3), ("Warning", 0), ("Warning", 2)]
        );
    }

    #[test]
    fn no_matches_yield_empty_not_none() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "all good\nnothing to see").unwrap();

        let out = extractor(10, 10).load(Some(file.path()));
        assert_eq!(out, Some(vec![]));
    }

    #[test]
    fn missing_path_or_file_yields_none() {
        let ex = extractor(10, 10);
        assert_eq!(ex.load(None), None);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.log");
        assert_eq!(ex.load(Some(missing.as_path())), None);
        let err = ex.extract(&missing).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(_)));
        assert_eq!(
            err.to_string(),
            format!("Error: File '{}' not found.", missing.display())
        );
    }

    #[test]
    fn directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ex = extractor(10, 10);

        assert!(matches!(ex.extract(dir.path()), Err(ExtractError::NotFound(_))));
        assert_eq!(ex.load(Some(dir.path())), None);
    }

    // Readable metadata, but reading from offset 0 fails with EIO, even as root.
    #[cfg(target_os = "linux")]
    #[test]
    fn unreadable_file_is_a_read_error() {
        let mem = Path::new("/proc/self/mem");
        let ex = extractor(10, 10);

        let err = ex.extract(mem).unwrap_err();
        assert!(matches!(err, ExtractError::Read(_)));
        let message = err.to_string();
        assert!(message.starts_with("Error reading file: "), "{message}");
        assert!(!message.contains("Error: "), "{message}");

        assert_eq!(ex.load(Some(mem)), None);
    }

    #[test]
    fn reads_crlf_and_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ok\r\nERROR \xff bad\r\nafter\r\n").unwrap();

        let out = extractor(1, 1).extract(file.path()).unwrap();
        let texts: Vec<String> = out.iter().map(ToString::to_string).collect();
        assert_eq!(texts, ["Error: ok", "Error: ERROR \u{fffd} bad", "Error: after"]);
    }
}
