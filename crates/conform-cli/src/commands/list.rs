//! List command - show the corpus inputs a run would use

use crate::testing::TestSuite;
use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;

/// Arguments for the list command
#[derive(Debug, Clone)]
pub struct ListArgs {
    pub dir: PathBuf,
    pub suffix: String,
    pub pattern: Option<String>,
}

/// Print discovered files, one per line, in run order
pub fn run(args: &ListArgs) -> Result<usize> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_output(args, &mut out)
}

pub fn run_with_output<W: Write>(args: &ListArgs, out: &mut W) -> Result<usize> {
    let mut suite = TestSuite::discover(&args.dir, &args.suffix)
        .with_context(|| format!("Cannot discover tests in {}", args.dir.display()))?;

    if let Some(pattern) = &args.pattern {
        suite = suite.filter(pattern);
    }

    for case in &suite.cases {
        writeln!(out, "{}", case.file.display())?;
    }

    Ok(suite.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_list_prints_sorted_matches() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("z.pf"), "").unwrap();
        fs::write(dir.path().join("m.pf"), "").unwrap();
        fs::write(dir.path().join("skip.txt"), "").unwrap();

        let args = ListArgs {
            dir: dir.path().to_path_buf(),
            suffix: ".pf".to_string(),
            pattern: None,
        };

        let mut buf = Vec::new();
        let count = run_with_output(&args, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(count, 2);
        assert!(lines[0].ends_with("m.pf"));
        assert!(lines[1].ends_with("z.pf"));
    }

    #[test]
    fn test_list_missing_directory_errors() {
        let dir = tempdir().unwrap();
        let args = ListArgs {
            dir: dir.path().join("absent"),
            suffix: ".pf".to_string(),
            pattern: None,
        };

        let mut buf = Vec::new();
        assert!(run_with_output(&args, &mut buf).is_err());
        assert!(buf.is_empty());
    }
}
