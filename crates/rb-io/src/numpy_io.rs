//! Collective `save` / `load` / `exists` of `.npy` files.
//!
//! Every rank must make the same calls in the same order. The leader does
//! the filesystem work and broadcasts a framed reply: a status byte
//! followed by the payload (file bytes, or an error message).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::group::ProcessGroup;
use crate::npy::{self, NpyArray};
use crate::{IoError, IoResult};

const OK: u8 = 0;
const NOT_FOUND: u8 = 1;
const FAILED: u8 = 2;

pub struct NumpyIo<'g> {
    group: &'g dyn ProcessGroup,
}

impl<'g> NumpyIo<'g> {
    pub fn new(group: &'g dyn ProcessGroup) -> Self {
        Self { group }
    }

    pub fn group(&self) -> &'g dyn ProcessGroup {
        self.group
    }

    /// `<directory>/<name>.npy`
    pub fn path(directory: &Path, name: &str) -> PathBuf {
        directory.join(format!("{name}.npy"))
    }

    pub fn save(&self, content: &NpyArray, directory: &Path, name: &str) -> IoResult<()> {
        let path = Self::path(directory, name);
        let bytes = self.group.is_leader().then(|| npy::encode(content));
        self.write_raw(&path, bytes)
    }

    pub fn load(&self, directory: &Path, name: &str) -> IoResult<NpyArray> {
        let bytes = self.read_raw(&Self::path(directory, name))?;
        npy::decode(&bytes)
    }

    pub fn exists(&self, directory: &Path, name: &str) -> IoResult<bool> {
        let path = Self::path(directory, name);
        let local = self.group.is_leader().then(|| Ok(vec![u8::from(path.is_file())]));
        let reply = self.collective(&path, local)?;
        Ok(reply.first().copied() == Some(1))
    }

    /// Leader writes `bytes` to `path`, creating parent directories.
    pub(crate) fn write_raw(&self, path: &Path, bytes: Option<Vec<u8>>) -> IoResult<()> {
        let local = if self.group.is_leader() {
            let bytes = bytes.unwrap_or_default();
            debug!(path = %path.display(), bytes = bytes.len(), "writing file");
            Some(write_file(path, &bytes).map(|()| Vec::new()))
        } else {
            None
        };
        self.collective(path, local).map(|_| ())
    }

    /// Leader reads `path`; every rank receives the same bytes.
    pub(crate) fn read_raw(&self, path: &Path) -> IoResult<Vec<u8>> {
        let local = self.group.is_leader().then(|| read_file(path));
        self.collective(path, local)
    }

    fn collective(&self, path: &Path, local: Option<IoResult<Vec<u8>>>) -> IoResult<Vec<u8>> {
        match local {
            Some(result) => {
                self.group.broadcast_bytes(Some(frame(&result)));
                result
            }
            None => unframe(path, self.group.broadcast_bytes(None)),
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn read_file(path: &Path) -> IoResult<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(IoError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(err.into()),
    }
}

fn frame(result: &IoResult<Vec<u8>>) -> Vec<u8> {
    let (status, payload): (u8, &[u8]) = match result {
        Ok(bytes) => (OK, bytes.as_slice()),
        Err(IoError::NotFound { .. }) => (NOT_FOUND, &[][..]),
        Err(err) => {
            let mut out = vec![FAILED];
            out.extend_from_slice(err.to_string().as_bytes());
            return out;
        }
    };
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(status);
    out.extend_from_slice(payload);
    out
}

fn unframe(path: &Path, mut reply: Vec<u8>) -> IoResult<Vec<u8>> {
    if reply.is_empty() {
        return Err(IoError::Collective {
            message: "empty reply from leader".to_string(),
        });
    }
    let payload = reply.split_off(1);
    match reply[0] {
        OK => Ok(payload),
        NOT_FOUND => Err(IoError::NotFound {
            path: path.to_path_buf(),
        }),
        _ => Err(IoError::Collective {
            message: String::from_utf8_lossy(&payload).into_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_status() {
        let path = Path::new("x.npy");
        assert_eq!(unframe(path, frame(&Ok(vec![4, 5]))).unwrap(), vec![4, 5]);
        assert!(matches!(
            unframe(path, frame(&Err(IoError::NotFound { path: path.into() }))),
            Err(IoError::NotFound { .. })
        ));
        match unframe(path, frame(&Err(IoError::format("bad header")))) {
            Err(IoError::Collective { message }) => assert!(message.contains("bad header")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn path_appends_extension() {
        assert_eq!(
            NumpyIo::path(Path::new("/tmp/data"), "basis"),
            PathBuf::from("/tmp/data/basis.npy")
        );
    }
}
