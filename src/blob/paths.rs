// PathManager maps content hashes to locations in the storage root.
//
// The layout is a split-directory content-addressable store plus a staging
// area for in-flight writes:
//
//	<root>
//	├── blobs
//	│   └── <algorithm>
//	│       └── <first two hex bytes of digest>
//	│           └── <hex digest>
//	│               └── data
//	└── staging
//	    └── <uuid>
//
// Content lands in staging first and is renamed into the blobs tree once
// durable, so a path under blobs/ is only ever visible with complete bytes.

use crate::utils::digest::ContentHash;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct PathManager {
    root: PathBuf,
}

impl PathManager {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the path to the root of the blob tree,
    /// (e.g. `<root>/blobs`).
    pub fn blobs_path(&self) -> PathBuf {
        self.root.join("blobs")
    }

    /// Returns the directory holding a single blob,
    /// (e.g. `<root>/blobs/sha256/2c/2cf2...9824`).
    pub fn blob_dir(&self, hash: &ContentHash) -> PathBuf {
        self.blobs_path()
            .join(hash.algorithm())
            .join(&hash.hex()[..2])
            .join(hash.hex())
    }

    /// Returns the path to the data of a single blob,
    /// (e.g. `<root>/blobs/sha256/2c/2cf2...9824/data`).
    pub fn blob_data_path(&self, hash: &ContentHash) -> PathBuf {
        self.blob_dir(hash).join("data")
    }

    /// Returns the path to the root of the staging area,
    /// (e.g. `<root>/staging`).
    pub fn staging_path(&self) -> PathBuf {
        self.root.join("staging")
    }

    /// Returns the staging path for one in-flight write,
    /// (e.g. `<root>/staging/<uuid>`).
    pub fn staging_file(&self, id: &str) -> PathBuf {
        self.staging_path().join(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_paths_split_by_hex_prefix() {
        let paths = PathManager::new("/data");
        let hash = ContentHash::of(b"hello");
        let data = paths.blob_data_path(&hash);
        let expected = format!(
            "/data/blobs/sha256/{}/{}/data",
            &hash.hex()[..2],
            hash.hex()
        );
        assert_eq!(data, PathBuf::from(expected));
    }
}
