use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by store persistence helpers.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to encode store state: {0}")]
    Encode(serde_cbor::Error),
    #[error("failed to decode store state: {0}")]
    Decode(serde_cbor::Error),
    #[error("failed to read state file: {0}")]
    Read(std::io::Error),
    #[error("failed to write state file: {0}")]
    Write(std::io::Error),
}

/// Encodes a persisted store state to CBOR bytes.
pub fn encode_state_cbor<T: Serialize>(state: &T) -> Result<Vec<u8>, PersistenceError> {
    serde_cbor::to_vec(state).map_err(PersistenceError::Encode)
}

/// Decodes a persisted store state from CBOR bytes.
pub fn decode_state_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PersistenceError> {
    serde_cbor::from_slice(bytes).map_err(PersistenceError::Decode)
}

/// Saves state to the given path as CBOR, atomically via a tmp file.
pub fn save_state_to_path<T: Serialize>(
    path: impl AsRef<Path>,
    state: &T,
) -> Result<(), PersistenceError> {
    let bytes = encode_state_cbor(state)?;
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(PersistenceError::Write)?;
    fs::rename(&tmp, path).map_err(PersistenceError::Write)
}

/// Loads state from the given CBOR file path.
pub fn load_state_from_path<T: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<T, PersistenceError> {
    let bytes = fs::read(path.as_ref()).map_err(PersistenceError::Read)?;
    decode_state_cbor(&bytes)
}

/// Loads state if the file exists; otherwise returns the default.
pub fn load_state_or_default<T: DeserializeOwned + Default>(
    path: impl AsRef<Path>,
) -> Result<T, PersistenceError> {
    if !path.as_ref().exists() {
        return Ok(T::default());
    }
    load_state_from_path(path)
}

/// Debounce handle between the store and the persistence driver: every
/// mutation marks the flag, the driver batches writes by draining it.
#[derive(Debug, Default)]
pub struct PersistenceRequest {
    dirty: AtomicBool,
}

impl PersistenceRequest {
    /// Marks the durable state as needing a write.
    pub fn request(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Clears and returns the dirty flag; the driver persists when true.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use agora_core::StorageHash;

    use super::{
        load_state_from_path, load_state_or_default, save_state_to_path, PersistenceRequest,
    };
    use crate::sequence::{SequenceNumberEntry, SequenceNumberMap};

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        let pid = std::process::id();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be monotonic enough for tests")
            .as_nanos();
        p.push(format!("agora-store-{name}-{pid}-{nanos}.cbor"));
        p
    }

    #[test]
    fn sequence_map_file_round_trip_and_default() {
        let mut map = SequenceNumberMap::default();
        map.put(
            StorageHash::of(b"entry"),
            SequenceNumberEntry {
                sequence_nr: 7,
                time_stamp: 1_000,
            },
        );

        let file = temp_path("seqnr");
        save_state_to_path(&file, &map).expect("state should be saved");
        let loaded: SequenceNumberMap = load_state_from_path(&file).expect("state should load");
        let entry = loaded
            .get(&StorageHash::of(b"entry"))
            .expect("entry should survive the round trip");
        assert_eq!(entry.sequence_nr, 7);

        let missing = temp_path("missing");
        let defaulted: SequenceNumberMap =
            load_state_or_default(&missing).expect("missing file should return default");
        assert!(defaulted.is_empty());

        let _ = std::fs::remove_file(&file);
    }

    #[test]
    fn dirty_flag_batches_requests() {
        let request = PersistenceRequest::default();
        assert!(!request.take_dirty());

        request.request();
        request.request();
        assert!(request.is_dirty());
        assert!(request.take_dirty());
        assert!(!request.take_dirty());
    }
}
