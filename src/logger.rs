use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub trait Logger: Send + Sync {
    fn start(&self, _bind: &str, _root: &Path) {}
    fn inventory(&self, _received: usize, _needed: usize) {}
    fn saved(&self, _rel: &str, _bytes: u64) {}
    fn error(&self, _context: &str, _msg: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Plain lines on stderr
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn start(&self, bind: &str, root: &Path) {
        eprintln!("aurorad listening on {} root={}", bind, root.display());
    }
    fn inventory(&self, received: usize, needed: usize) {
        eprintln!("Received inventory ({received}). Need {needed} files.");
    }
    fn saved(&self, rel: &str, bytes: u64) {
        eprintln!("Saved {rel} ({bytes} bytes).");
    }
    fn error(&self, context: &str, msg: &str) {
        eprintln!("{context} error: {msg}");
    }
}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn start(&self, bind: &str, root: &Path) {
        self.line(&format!("START bind={} root={}", bind, root.display()));
    }
    fn inventory(&self, received: usize, needed: usize) {
        self.line(&format!("INVENTORY received={received} needed={needed}"));
    }
    fn saved(&self, rel: &str, bytes: u64) {
        self.line(&format!("SAVED rel={rel} bytes={bytes}"));
    }
    fn error(&self, context: &str, msg: &str) {
        self.line(&format!("ERROR ctx={context} msg={msg}"));
    }
}

/// Forwards every event to each inner logger
pub struct TeeLogger {
    inner: Vec<Arc<dyn Logger>>,
}

impl TeeLogger {
    pub fn new(inner: Vec<Arc<dyn Logger>>) -> Self {
        Self { inner }
    }
}

impl Logger for TeeLogger {
    fn start(&self, bind: &str, root: &Path) {
        self.inner.iter().for_each(|l| l.start(bind, root));
    }
    fn inventory(&self, received: usize, needed: usize) {
        self.inner.iter().for_each(|l| l.inventory(received, needed));
    }
    fn saved(&self, rel: &str, bytes: u64) {
        self.inner.iter().for_each(|l| l.saved(rel, bytes));
    }
    fn error(&self, context: &str, msg: &str) {
        self.inner.iter().for_each(|l| l.error(context, msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_text_logger_appends_timestamped_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs/aurorad.log");
        {
            let log = TextLogger::new(&path).unwrap();
            log.saved("DCIM/a.jpg", 42);
            log.error("upload", "disk full");
        }
        let log = TextLogger::new(&path).unwrap();
        log.inventory(3, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("SAVED rel=DCIM/a.jpg bytes=42"));
        assert!(lines[1].ends_with("ERROR ctx=upload msg=disk full"));
        assert!(lines[2].ends_with("INVENTORY received=3 needed=1"));
    }

    #[test]
    fn test_tee_forwards_to_all() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.log");
        let b = tmp.path().join("b.log");
        let tee = TeeLogger::new(vec![
            Arc::new(TextLogger::new(&a).unwrap()),
            Arc::new(NoopLogger),
            Arc::new(TextLogger::new(&b).unwrap()),
        ]);
        tee.saved("x.txt", 1);
        drop(tee);

        for p in [a, b] {
            assert!(std::fs::read_to_string(p).unwrap().contains("SAVED rel=x.txt bytes=1"));
        }
    }
}
