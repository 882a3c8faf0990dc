use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use veriwave_domain::DetectError;

const CHUNK_SIZE: usize = 4096;

/// SHA-256 content fingerprint of an artifact file, streamed in fixed-size
/// chunks. Logged for provenance at model load; never used for access control.
pub fn fingerprint<P: AsRef<Path>>(path: P) -> Result<String, DetectError> {
    let path = path.as_ref();
    let mut file =
        File::open(path).map_err(|_| DetectError::ArtifactNotFound(path.to_path_buf()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|err| DetectError::corrupt(format!("read {}: {err}", path.display())))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fingerprint_matches_known_sha256_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        File::create(&path).unwrap().write_all(b"abc").unwrap();

        let hash = fingerprint(&path).unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fingerprint_streams_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let bytes = vec![0x5au8; CHUNK_SIZE * 3 + 17];
        File::create(&path).unwrap().write_all(&bytes).unwrap();

        let streamed = fingerprint(&path).unwrap();
        let direct = format!("{:x}", Sha256::digest(&bytes));
        assert_eq!(streamed, direct);
    }

    #[test]
    fn missing_file_reports_artifact_not_found() {
        let result = fingerprint("no-such-artifact.onnx");
        assert!(matches!(result, Err(DetectError::ArtifactNotFound(_))));
    }
}
