use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{Span, debug, info_span, warn};

use crate::tensor::DecodeError;

/// Suffix of in-flight writes; such files are never listed.
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum CheckpointError {
    #[display("invalid checkpoint key {key:?}")]
    InvalidKey { key: String },
    #[display("I/O error on {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("malformed JSON in {}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("cannot decode weights")]
    #[from]
    Decode(DecodeError),
    #[display("invalid manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },
}

/// Kind of payload expected by [`CheckpointStore::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Json,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl Payload {
    #[must_use]
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Json(_) => PayloadKind::Json,
            Self::Binary(_) => PayloadKind::Binary,
        }
    }

    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.kind() == PayloadKind::Binary
    }
}

/// Keyed file storage rooted at one directory.
///
/// Keys are relative `/`-separated paths. Writing a key overwrites the previous
/// artifact; writes go to a temporary sibling first and are renamed into place.
/// Methods take `&self`; callers must not issue overlapping writes to one key.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
    span: Span,
}

impl CheckpointStore {
    /// Opens a store, creating `root` if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CheckpointError::Io {
            path: root.clone(),
            source,
        })?;
        let span = info_span!("checkpoint_store", root = %root.display());
        Ok(Self { root, span })
    }

    /// Replaces the span entered by every operation of this store.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `key` to a path below the root.
    pub fn path_of(&self, key: &str) -> Result<PathBuf, CheckpointError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.ends_with(TEMP_SUFFIX)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(CheckpointError::InvalidKey {
                key: key.to_owned(),
            });
        }
        Ok(self.root.join(relative))
    }

    pub fn write(&self, key: &str, payload: &Payload) -> Result<(), CheckpointError> {
        let _enter = self.span.enter();
        let path = self.path_of(key)?;
        let bytes = match payload {
            Payload::Json(value) => {
                serde_json::to_vec_pretty(value).map_err(|source| CheckpointError::Json {
                    path: path.clone(),
                    source,
                })?
            }
            Payload::Binary(bytes) => bytes.clone(),
        };
        write_atomic(&path, &bytes)?;
        debug!(key, bytes = bytes.len(), "saved");
        Ok(())
    }

    /// Reads `key`, or returns `None` when it was never written.
    pub fn read(&self, key: &str, kind: PayloadKind) -> Result<Option<Payload>, CheckpointError> {
        let Some((path, bytes)) = self.read_bytes(key)? else {
            return Ok(None);
        };
        let payload = match kind {
            PayloadKind::Json => Payload::Json(
                serde_json::from_slice(&bytes)
                    .map_err(|source| CheckpointError::Json { path, source })?,
            ),
            PayloadKind::Binary => Payload::Binary(bytes),
        };
        Ok(Some(payload))
    }

    pub fn write_json<T>(&self, key: &str, value: &T) -> Result<(), CheckpointError>
    where
        T: Serialize + ?Sized,
    {
        let _enter = self.span.enter();
        let path = self.path_of(key)?;
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| CheckpointError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)?;
        debug!(key, bytes = bytes.len(), "saved");
        Ok(())
    }

    pub fn read_json<T>(&self, key: &str) -> Result<Option<T>, CheckpointError>
    where
        T: DeserializeOwned,
    {
        let Some((path, bytes)) = self.read_bytes(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes)
            .map_err(|source| CheckpointError::Json { path, source })?;
        Ok(Some(value))
    }

    pub fn write_binary(&self, key: &str, bytes: &[u8]) -> Result<(), CheckpointError> {
        let _enter = self.span.enter();
        let path = self.path_of(key)?;
        write_atomic(&path, bytes)?;
        debug!(key, bytes = bytes.len(), "saved");
        Ok(())
    }

    pub fn read_binary(&self, key: &str) -> Result<Option<Vec<u8>>, CheckpointError> {
        Ok(self.read_bytes(key)?.map(|(_, bytes)| bytes))
    }

    pub fn exists(&self, key: &str) -> Result<bool, CheckpointError> {
        is_stored(&self.path_of(key)?)
    }

    /// Every stored key, sorted.
    pub fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let _enter = self.span.enter();
        let mut keys = vec![];
        collect_keys(&self.root, &mut vec![], &mut keys)?;
        keys.sort();
        Ok(keys)
    }

    fn read_bytes(&self, key: &str) -> Result<Option<(PathBuf, Vec<u8>)>, CheckpointError> {
        let _enter = self.span.enter();
        let path = self.path_of(key)?;
        let bytes = if is_stored(&path)? {
            match fs::read(&path) {
                Ok(bytes) => Some(bytes),
                Err(e) if is_absent(&e) => None,
                Err(source) => return Err(CheckpointError::Io { path, source }),
            }
        } else {
            None
        };
        if bytes.is_none() {
            warn!(key, "checkpoint not found");
        }
        Ok(bytes.map(|bytes| (path, bytes)))
    }
}

/// Whether a file was written at `path`.
///
/// Directories and paths running through a file are not stored keys.
fn is_stored(path: &Path) -> Result<bool, CheckpointError> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if is_absent(&e) => Ok(false),
        Err(source) => Err(CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn is_absent(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CheckpointError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| CheckpointError::Io { path, source }
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(TEMP_SUFFIX);
    let temp = PathBuf::from(temp);
    fs::write(&temp, bytes).map_err(io_err(&temp))?;
    fs::rename(&temp, path).map_err(io_err(path))
}

fn collect_keys(
    dir: &Path,
    prefix: &mut Vec<String>,
    keys: &mut Vec<String>,
) -> Result<(), CheckpointError> {
    let io_err = |source| CheckpointError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_dir() {
            prefix.push(name);
            collect_keys(&entry.path(), prefix, keys)?;
            prefix.pop();
        } else if !name.ends_with(TEMP_SUFFIX) {
            let mut key = prefix.join("/");
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(&name);
            keys.push(key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store() -> (tempfile::TempDir, CheckpointStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("checkpoints")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_root() {
        let (_dir, store) = store();
        assert!(store.root().is_dir());
        assert!(CheckpointStore::open(store.root()).is_ok());
    }

    #[test]
    fn test_read_missing_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.read("nope.json", PayloadKind::Json).unwrap(), None);
        assert_eq!(store.read_binary("a/b/c.bin").unwrap(), None);
        assert_eq!(store.read_json::<u32>("x.json").unwrap(), None);
        assert!(!store.exists("nope.json").unwrap());
    }

    #[test]
    fn test_read_through_file_or_directory_is_none() {
        let (_dir, store) = store();
        store.write_json("run-1", &1).unwrap();
        assert_eq!(store.read("run-1/metadata.json", PayloadKind::Json).unwrap(), None);
        assert!(!store.exists("run-1/metadata.json").unwrap());

        store.write_json("sub/inner.json", &1).unwrap();
        assert_eq!(store.read_binary("sub").unwrap(), None);
        assert_eq!(store.read_json::<u32>("sub").unwrap(), None);
        assert!(!store.exists("sub").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_error() {
        use std::os::unix::fs::PermissionsExt as _;

        let (_dir, store) = store();
        store.write_json("locked/model.json", &1).unwrap();
        let locked = store.root().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // privileged users bypass permission bits
        let denied = fs::metadata(locked.join("model.json")).is_err();
        let exists = store.exists("locked/model.json");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if denied {
            assert!(matches!(exists, Err(CheckpointError::Io { .. })));
        } else {
            assert!(exists.unwrap());
        }
    }

    #[test]
    fn test_json_and_binary_payloads() {
        let (_dir, store) = store();
        let json = Payload::Json(json!({ "generation": 3, "players": [1, 2] }));
        store.write("population/latest.json", &json).unwrap();
        assert_eq!(
            store.read("population/latest.json", PayloadKind::Json).unwrap(),
            Some(json.clone())
        );
        assert!(!json.is_binary());

        let binary = Payload::Binary(vec![0, 159, 255]);
        store.write("run/optimizer_state.bin", &binary).unwrap();
        let read = store
            .read("run/optimizer_state.bin", PayloadKind::Binary)
            .unwrap()
            .unwrap();
        assert!(read.is_binary());
        assert_eq!(read, binary);
    }

    #[test]
    fn test_overwrite_same_key() {
        let (_dir, store) = store();
        store.write_json("meta.json", &1).unwrap();
        store.write_json("meta.json", &2).unwrap();
        assert_eq!(store.read_json::<i32>("meta.json").unwrap(), Some(2));
    }

    #[test]
    fn test_malformed_json_is_error() {
        let (_dir, store) = store();
        store.write_binary("broken.json", b"{ not json").unwrap();
        assert!(matches!(
            store.read_json::<serde_json::Value>("broken.json"),
            Err(CheckpointError::Json { .. })
        ));
    }

    #[test]
    fn test_invalid_keys() {
        let (_dir, store) = store();
        for key in ["", "../escape", "/abs/path", "a/../b", "./a", "notes.tmp", "b/weights.bin.tmp"] {
            assert!(
                matches!(
                    store.write_binary(key, b"x"),
                    Err(CheckpointError::InvalidKey { .. })
                ),
                "{key}"
            );
        }
    }

    #[test]
    fn test_list_is_recursive_and_sorted() {
        let (_dir, store) = store();
        store.write_binary("b/weights.bin", b"1").unwrap();
        store.write_json("a.json", &0).unwrap();
        store.write_json("b/c/metadata.json", &0).unwrap();
        fs::write(store.root().join("b/partial.bin.tmp"), b"x").unwrap();
        assert_eq!(
            store.list().unwrap(),
            vec!["a.json", "b/c/metadata.json", "b/weights.bin"]
        );
    }
}
