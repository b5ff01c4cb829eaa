//! Waveform output.
//!
//! The kernel reports signal declarations and settled value changes to a
//! [`WaveformRecorder`]. [`VcdRecorder`] writes them as a Value Change Dump
//! that GTKWave or Surfer can open.

use std::io::Write;

use crate::error::SimError;
use crate::signal::SignalId;

/// Sink for signal declarations and value changes.
pub trait WaveformRecorder {
    /// Declares a signal. Called before the first change is recorded.
    fn register_signal(&mut self, id: SignalId, name: &str, width: u32) -> Result<(), SimError>;

    /// Opens a hierarchy level.
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Closes the innermost hierarchy level.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Records a settled value at `time_fs`.
    fn record_change(&mut self, time_fs: u64, id: SignalId, value: u128) -> Result<(), SimError>;

    /// Flushes the output at the end of a run.
    fn finalize(&mut self) -> Result<(), SimError>;
}

struct VcdVar {
    code: String,
    width: u32,
}

/// Where the writer is in the VCD file.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Empty,
    Declarations,
    Changes { last_fs: Option<u64> },
}

/// Writes a VCD file with a 1 fs timescale.
pub struct VcdRecorder<W: Write> {
    writer: W,
    vars: Vec<Option<VcdVar>>,
    declared: u32,
    section: Section,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder that writes to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            vars: Vec::new(),
            declared: 0,
            section: Section::Empty,
        }
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_header(&mut self) -> Result<(), SimError> {
        if self.section == Section::Empty {
            write!(
                self.writer,
                "$version\n  Strobe handshake bench\n$end\n$timescale\n  1fs\n$end\n"
            )?;
            self.section = Section::Declarations;
        }
        Ok(())
    }

    fn ensure_changes(&mut self) -> Result<(), SimError> {
        self.ensure_header()?;
        if self.section == Section::Declarations {
            writeln!(self.writer, "$enddefinitions $end")?;
            self.section = Section::Changes { last_fs: None };
        }
        Ok(())
    }

    /// Short identifier for the `index`-th declared signal, in base 94 over
    /// the printable characters `!`..=`~`.
    fn id_code(index: u32) -> String {
        let mut code = String::new();
        let mut rest = index;
        loop {
            code.push(char::from(b'!' + (rest % 94) as u8));
            match rest / 94 {
                0 => return code,
                next => rest = next - 1,
            }
        }
    }

    fn encode(value: u128, width: u32) -> String {
        if width == 1 {
            (value & 1).to_string()
        } else {
            format!("b{value:0w$b}", w = width as usize)
        }
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, id: SignalId, name: &str, width: u32) -> Result<(), SimError> {
        self.ensure_header()?;
        let code = Self::id_code(self.declared);
        self.declared += 1;
        writeln!(self.writer, "$var wire {width} {code} {name} $end")?;

        let slot = id.as_raw() as usize;
        if self.vars.len() <= slot {
            self.vars.resize_with(slot + 1, || None);
        }
        self.vars[slot] = Some(VcdVar { code, width });
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.ensure_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record_change(&mut self, time_fs: u64, id: SignalId, value: u128) -> Result<(), SimError> {
        let var = self
            .vars
            .get(id.as_raw() as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                SimError::config(format!("signal {} was not registered for VCD", id.as_raw()))
            })?;
        let line = match var.width {
            1 => format!("{}{}", Self::encode(value, 1), var.code),
            width => format!("{} {}", Self::encode(value, width), var.code),
        };

        self.ensure_changes()?;
        if self.section != (Section::Changes { last_fs: Some(time_fs) }) {
            writeln!(self.writer, "#{time_fs}")?;
            self.section = Section::Changes {
                last_fs: Some(time_fs),
            };
        }
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        self.ensure_changes()?;
        self.writer.flush()?;
        Ok(())
    }
}
