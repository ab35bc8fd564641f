//! Report sinks
//!
//! A sink hands out one writable target per report. Targets are addressed by
//! report kind, subject id and period label:
//!
//! ```text
//! Members/<id>/Reports for <label>/Main.txt
//! Providers/<id>/Reports for <label>/1.txt
//! EFT_Reports/Reports for <label>/Main.txt
//! Summary_Reports/Reports for <label>/Main.txt
//! ```
//!
//! Scheduled reports always resolve to `Main.txt`; manager-requested reports
//! take the first free `N.txt`, counting from 1.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Kind of report being written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportKind {
    /// Per-member service report
    Member,
    /// Per-provider service report
    Provider,
    /// Amounts owed to each provider
    Eft,
    /// Database-wide summary
    Summary,
}

impl ReportKind {
    /// Top-level directory for this kind
    pub fn directory(&self) -> &'static str {
        match self {
            ReportKind::Member => "Members",
            ReportKind::Provider => "Providers",
            ReportKind::Eft => "EFT_Reports",
            ReportKind::Summary => "Summary_Reports",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportKind::Member => "member",
            ReportKind::Provider => "provider",
            ReportKind::Eft => "EFT",
            ReportKind::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Destination for rendered reports
pub trait ReportSink: fmt::Debug {
    /// Open a fresh target for one report
    fn open(
        &mut self,
        kind: ReportKind,
        subject: Option<u32>,
        period_label: &str,
        manager_requested: bool,
    ) -> io::Result<Box<dyn Write>>;
}

/// Directory holding every report of one kind, subject and period
pub fn report_dir(kind: ReportKind, subject: Option<u32>, period_label: &str) -> PathBuf {
    let mut dir = PathBuf::from(kind.directory());
    if let Some(id) = subject {
        dir.push(id.to_string());
    }
    dir.push(format!("Reports for {}", period_label));
    dir
}

/// File name of the next report inside `dir`
fn report_name(manager_requested: bool, exists: impl Fn(&str) -> bool) -> String {
    if !manager_requested {
        return "Main.txt".to_string();
    }
    (1u32..)
        .map(|n| format!("{}.txt", n))
        .find(|name| !exists(name))
        .unwrap_or_else(|| "Main.txt".to_string())
}

/// Sink writing plain-text reports under a root directory
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    /// Create sink rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ReportSink for FileSink {
    fn open(
        &mut self,
        kind: ReportKind,
        subject: Option<u32>,
        period_label: &str,
        manager_requested: bool,
    ) -> io::Result<Box<dyn Write>> {
        let dir = self.root.join(report_dir(kind, subject, period_label));
        std::fs::create_dir_all(&dir)?;

        let name = report_name(manager_requested, |name| dir.join(name).exists());
        let path = dir.join(name);
        tracing::debug!(path = %path.display(), %kind, "Opening report file");

        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

type SharedFiles = Rc<RefCell<BTreeMap<PathBuf, Vec<u8>>>>;

/// In-memory sink with the same naming as [`FileSink`].
///
/// Clones share storage, so a caller can keep one handle to inspect what an
/// engine wrote through another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    files: SharedFiles,
}

impl MemorySink {
    /// Create empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of the report at `path` (relative, as in [`report_dir`])
    pub fn read(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .borrow()
            .get(path.as_ref())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Contents of a report addressed by its parts
    pub fn report(
        &self,
        kind: ReportKind,
        subject: Option<u32>,
        period_label: &str,
        file_name: &str,
    ) -> Option<String> {
        self.read(report_dir(kind, subject, period_label).join(file_name))
    }

    /// Every report path written so far
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.borrow().keys().cloned().collect()
    }

    /// Number of reports written so far
    pub fn len(&self) -> usize {
        self.files.borrow().len()
    }

    /// Check if nothing was written
    pub fn is_empty(&self) -> bool {
        self.files.borrow().is_empty()
    }
}

impl ReportSink for MemorySink {
    fn open(
        &mut self,
        kind: ReportKind,
        subject: Option<u32>,
        period_label: &str,
        manager_requested: bool,
    ) -> io::Result<Box<dyn Write>> {
        let dir = report_dir(kind, subject, period_label);
        let name = {
            let files = self.files.borrow();
            report_name(manager_requested, |name| files.contains_key(&dir.join(name)))
        };
        let path = dir.join(name);

        self.files.borrow_mut().insert(path.clone(), Vec::new());
        Ok(Box::new(MemoryWriter {
            files: Rc::clone(&self.files),
            path,
        }))
    }
}

struct MemoryWriter {
    files: SharedFiles,
    path: PathBuf,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.files
            .borrow_mut()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
