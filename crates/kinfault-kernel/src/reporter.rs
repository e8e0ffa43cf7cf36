//! Fault sinks.
//!
//! The engine streams every reported [`Fault`] to a [`FaultReporter`] in
//! increasing frame order.  Reporting is fire-and-forget: a sink cannot
//! abort the run.
//!
//! | Sink | Behaviour |
//! |---|---|
//! | `Vec<Fault>` | collects clones |
//! | [`TracingReporter`] | emits one `warn!` event per fault |
//! | [`WriterReporter`] | writes one formatted line per fault |

use std::io::{self, Write};

use kinfault_types::Fault;
use tracing::warn;

/// Receives faults as the engine finds them.
pub trait FaultReporter {
    fn report(&mut self, fault: &Fault);
}

impl FaultReporter for Vec<Fault> {
    fn report(&mut self, fault: &Fault) {
        self.push(fault.clone());
    }
}

impl<R: FaultReporter + ?Sized> FaultReporter for &mut R {
    fn report(&mut self, fault: &Fault) {
        (**self).report(fault);
    }
}

/// Logs faults through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FaultReporter for TracingReporter {
    fn report(&mut self, fault: &Fault) {
        warn!(frame = fault.frame(), kind = fault.label(), "{fault}");
    }
}

/// Writes each fault's message on its own line.
///
/// The first I/O error is kept and later writes are skipped; inspect it with
/// [`WriterReporter::finish`].
#[derive(Debug)]
pub struct WriterReporter<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> WriterReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    /// Flush and hand back the writer.
    ///
    /// # Errors
    ///
    /// Returns the first write error, or the flush error.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> FaultReporter for WriterReporter<W> {
    fn report(&mut self, fault: &Fault) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = writeln!(self.writer, "{fault}") {
            self.error = Some(err);
        }
    }
}

/// Forwards every fault to two sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: FaultReporter, B: FaultReporter> FaultReporter for Tee<A, B> {
    fn report(&mut self, fault: &Fault) {
        self.0.report(fault);
        self.1.report(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collision(frame: usize) -> Fault {
        Fault::Collision {
            frame,
            time: frame as f64 / 10.0,
            links: [1, 4],
            link_names: ["HEAD".to_string(), "HAND".to_string()],
        }
    }

    #[test]
    fn vec_collects_faults() {
        let mut sink: Vec<Fault> = Vec::new();
        sink.report(&collision(2));
        sink.report(&collision(9));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[1].frame(), 9);
    }

    #[test]
    fn writer_emits_one_line_per_fault() {
        let mut sink = WriterReporter::new(Vec::new());
        sink.report(&collision(5));
        sink.report(&collision(15));
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "  0.500 [s]: Collision between HEAD and HAND");
    }

    #[derive(Debug)]
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_keeps_first_error() {
        let mut sink = WriterReporter::new(Broken);
        sink.report(&collision(1));
        sink.report(&collision(2));
        let err = sink.finish().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn tee_feeds_both_sinks() {
        let mut a: Vec<Fault> = Vec::new();
        let mut b: Vec<Fault> = Vec::new();
        {
            let mut tee = Tee(&mut a, &mut b);
            tee.report(&collision(3));
        }
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn tracing_reporter_accepts_faults() {
        let mut sink = TracingReporter;
        sink.report(&collision(0));
    }
}
