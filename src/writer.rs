use crate::error::WriteError;
use crate::models::OutputRecord;
use std::io::Write;

/// Destination for assembled records, called in production order.
pub trait RecordSink {
    fn write(&mut self, record: OutputRecord) -> Result<(), WriteError>;

    /// Closes the output. Called once, only when the run did not fail.
    fn finish(&mut self) -> Result<(), WriteError>;
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn write(&mut self, record: OutputRecord) -> Result<(), WriteError> {
        (**self).write(record)
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        (**self).finish()
    }
}

/// Collects records in memory.
impl RecordSink for Vec<OutputRecord> {
    fn write(&mut self, record: OutputRecord) -> Result<(), WriteError> {
        self.push(record);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        Ok(())
    }
}

/// Streams records as one JSON array, one element per record.
///
/// Nothing is buffered beyond the underlying writer; if a run fails midway the
/// output is left without its closing bracket.
pub struct JsonArrayWriter<W: Write> {
    out: W,
    pretty: bool,
    written: u64,
    finished: bool,
}

impl<W: Write> JsonArrayWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            pretty: false,
            written: 0,
            finished: false,
        }
    }

    /// Indent each record object.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RecordSink for JsonArrayWriter<W> {
    fn write(&mut self, record: OutputRecord) -> Result<(), WriteError> {
        if self.finished {
            return Err(WriteError::Finished);
        }

        let separator = if self.written == 0 { b"[\n" } else { b",\n" };
        self.out.write_all(separator)?;

        let result = if self.pretty {
            serde_json::to_writer_pretty(&mut self.out, &record)
        } else {
            serde_json::to_writer(&mut self.out, &record)
        };
        result.map_err(|source| {
            if source.is_io() {
                WriteError::Io(source.into())
            } else {
                WriteError::Serialize {
                    title: record.title.clone(),
                    source,
                }
            }
        })?;

        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        if self.finished {
            return Err(WriteError::Finished);
        }
        self.finished = true;

        let closing = if self.written == 0 { b"[]\n" } else { b"\n]\n" };
        self.out.write_all(closing)?;
        self.out.flush()?;
        Ok(())
    }
}
