//! Append-only spill files of encoded values.
//!
//! Each frame is a little-endian `u32` length followed by a postcard
//! encoding of the value's type and body. The format is private to one
//! process; files are deleted when their writer or reader is dropped.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::types::TypeContext;
use crate::types::encoding::encode_type;
use crate::value::Value;

#[derive(Serialize, Deserialize)]
struct Frame {
    ty: Vec<u8>,
    body: Option<Vec<u8>>,
}

pub struct SpillWriter {
    file: NamedTempFile,
    out: BufWriter<File>,
    count: usize,
}

impl SpillWriter {
    /// Creates a spill file in `dir`, or in the system temp dir.
    pub fn create(dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sluice-spill-");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let out = BufWriter::new(file.reopen()?);
        debug!(path = %file.path().display(), "created spill file");
        Ok(SpillWriter {
            file,
            out,
            count: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn write(&mut self, val: &Value) -> Result<()> {
        let frame = Frame {
            ty: encode_type(val.ty()),
            body: val.bytes().map(<[u8]>::to_vec),
        };
        let buf = postcard::to_stdvec(&frame)?;
        let len = u32::try_from(buf.len())
            .map_err(|_| Error::Internal(format!("spill frame of {} bytes", buf.len())))?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.write_all(&buf)?;
        self.count += 1;
        Ok(())
    }

    /// Flushes the file and reopens it for reading from the start.
    pub fn finish(mut self, ctx: Arc<TypeContext>) -> Result<SpillReader> {
        self.out.flush()?;
        let mut input = self.file.reopen()?;
        input.seek(SeekFrom::Start(0))?;
        debug!(path = %self.file.path().display(), count = self.count, "reading back spill file");
        Ok(SpillReader {
            ctx,
            file: self.file,
            input: BufReader::new(input),
            remaining: self.count,
        })
    }
}

pub struct SpillReader {
    ctx: Arc<TypeContext>,
    file: NamedTempFile,
    input: BufReader<File>,
    remaining: usize,
}

impl SpillReader {
    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// The next value, or `None` after the last frame.
    pub fn read(&mut self) -> Result<Option<Value>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let mut len = [0u8; 4];
        match self.input.read_exact(&mut len) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                return Err(Error::Internal(format!(
                    "spill file truncated with {} frames left",
                    self.remaining
                )));
            }
            Err(err) => return Err(err.into()),
        }
        let mut buf = vec![0u8; u32::from_le_bytes(len) as usize];
        self.input.read_exact(&mut buf)?;
        let frame: Frame = postcard::from_bytes(&buf)?;
        let ty = self.ctx.lookup_by_value(&frame.ty)?;
        self.remaining -= 1;
        trace!(remaining = self.remaining, "read spilled value");
        Ok(Some(Value::new(ty, frame.body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::build;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spill_round_trip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(TypeContext::new());
        let vals = vec![
            Value::int64(1),
            Value::null_of(crate::types::Type::string()),
            build::record(&ctx, vec![("a".into(), Value::string("x"))]).unwrap(),
        ];
        let mut w = SpillWriter::create(Some(dir.path())).unwrap();
        for v in &vals {
            w.write(v).unwrap();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        let mut r = w.finish(ctx).unwrap();
        let mut out = Vec::new();
        while let Some(v) = r.read().unwrap() {
            out.push(v);
        }
        assert_eq!(out, vals);
        drop(r);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
