use edgegrid_core::Result;
use std::fmt::{Debug, Formatter};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// A shared, writable byte sink for debug, verbose and log output.
#[derive(Clone)]
pub struct Sink(Arc<Mutex<dyn Write + Send>>);

impl Debug for Sink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sink")
    }
}

impl Sink {
    /// Wrap any writer.
    pub fn new(w: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(w)))
    }

    /// Sink writing to standard error.
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Write the whole string and flush.
    pub fn write_str(&self, s: &str) -> Result<()> {
        let mut w = self.0.lock().expect("lock poisoned");
        w.write_all(s.as_bytes())?;
        w.flush()?;
        Ok(())
    }
}
