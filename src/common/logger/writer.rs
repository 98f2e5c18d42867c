use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
    sync::Arc,
};

use parking_lot::Mutex;

/// Append-only log file that keeps at most `max_lines` lines, trimming the
/// oldest ones in batches.
#[derive(Clone)]
pub struct RotatingFileWriter {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    path: PathBuf,
    file: File,
    max_lines: usize,
    lines: usize,
}

impl RotatingFileWriter {
    pub fn open(path: impl Into<PathBuf>, max_lines: usize) -> io::Result<Self> {
        let path = path.into();
        let lines = match File::open(&path) {
            Ok(f) => BufReader::new(f).lines().count(),
            Err(_) => 0,
        };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                path,
                file,
                max_lines: max_lines.max(1),
                lines,
            })),
        })
    }
}

impl Inner {
    /// Trim once the file overshoots the cap by 10% (at least 50 lines) so
    /// the rewrite cost is amortised.
    fn overshoot(&self) -> usize {
        (self.max_lines / 10).max(50)
    }

    fn trim(&mut self) -> io::Result<()> {
        let kept: Vec<String> = {
            let reader = BufReader::new(File::open(&self.path)?);
            let all: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
            let start = all.len().saturating_sub(self.max_lines);
            all[start..].to_vec()
        };
        let mut file = File::create(&self.path)?;
        for line in &kept {
            writeln!(file, "{line}")?;
        }
        self.lines = kept.len();
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        inner.file.write_all(buf)?;
        inner.lines += buf.iter().filter(|&&b| b == b'\n').count();
        if inner.lines >= inner.max_lines + inner.overshoot() {
            if let Err(e) = inner.trim() {
                eprintln!("Failed to trim log file: {e}");
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().file.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
