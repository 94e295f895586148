use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colz_array::Array;
use colz_dtype::DType;
use colz_error::ColzResult;

use crate::carray::CompressionParams;
use crate::carray::codec::{compress, decompress};

/// The expected length used to size chunks when nothing better is known.
pub(crate) const DEFAULT_EXPECTEDLEN: usize = 1 << 16;

/// Where the compressed bytes of one chunk live.
#[derive(Debug, Clone)]
pub(crate) enum ChunkData {
    Memory(Arc<[u8]>),
    Disk(PathBuf),
}

/// One full, compressed chunk.
#[derive(Debug, Clone)]
pub(crate) struct Chunk {
    data: ChunkData,
    cbytes: usize,
}

impl Chunk {
    /// Compress `values`, writing them to `path` when given.
    pub(crate) fn encode(
        values: &Array,
        cparams: CompressionParams,
        path: Option<&Path>,
    ) -> ColzResult<Self> {
        let bytes = compress(&values.to_le_bytes(), values.dtype().byte_width(), cparams)?;
        let cbytes = bytes.len();
        let data = match path {
            Some(path) => {
                fs::write(path, &bytes)?;
                ChunkData::Disk(path.to_path_buf())
            }
            None => ChunkData::Memory(bytes.into()),
        };
        Ok(Self { data, cbytes })
    }

    /// A chunk already on disk.
    pub(crate) fn on_disk(path: PathBuf) -> ColzResult<Self> {
        let cbytes = usize::try_from(fs::metadata(&path)?.len()).unwrap_or(usize::MAX);
        Ok(Self {
            data: ChunkData::Disk(path),
            cbytes,
        })
    }

    pub(crate) fn cbytes(&self) -> usize {
        self.cbytes
    }

    fn bytes(&self) -> ColzResult<Cow<'_, [u8]>> {
        Ok(match &self.data {
            ChunkData::Memory(bytes) => Cow::Borrowed(bytes.as_ref()),
            ChunkData::Disk(path) => Cow::Owned(fs::read(path)?),
        })
    }

    pub(crate) fn decode(&self, dtype: &DType) -> ColzResult<Array> {
        Array::from_le_bytes(dtype, &decompress(&self.bytes()?)?)
    }
}

/// The path of chunk `index` below a column's data directory.
pub(crate) fn chunk_path(data_dir: &Path, index: usize) -> PathBuf {
    data_dir.join(format!("__{index}.blp"))
}

/// Parse the index back out of a chunk file name.
pub(crate) fn chunk_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("__")?
        .strip_suffix(".blp")?
        .parse()
        .ok()
}

/// Elements per chunk for a column expected to hold `expectedlen` values of `itemsize` bytes.
///
/// The chunk size doubles with every order of magnitude of the expected size in megabytes,
/// starting from 64 KiB for a megabyte, and is then scaled by 8 for sequential access.
pub(crate) fn calc_chunklen(expectedlen: usize, itemsize: usize) -> usize {
    let itemsize = itemsize.max(1);
    let megabytes = (expectedlen as f64 * itemsize as f64 / (1024.0 * 1024.0)).clamp(1e-3, 1e7);
    let zone = megabytes.log10().trunc();
    let chunksize = 1024.0 * (2f64.powf(zone + 6.0)).trunc() * 8.0;
    ((chunksize as usize) / itemsize).max(1)
}

#[cfg(test)]
mod test {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[rstest]
    #[case(1 << 16, 8, 65_536)]
    #[case(10, 8, 8_192)]
    #[case(10_000_000, 8, 131_072)]
    #[case(1 << 16, 1, 262_144)]
    fn chunklen_grows_with_size(
        #[case] expectedlen: usize,
        #[case] itemsize: usize,
        #[case] chunklen: usize,
    ) {
        assert_eq!(calc_chunklen(expectedlen, itemsize), chunklen);
    }

    #[test]
    fn chunk_names() {
        assert_eq!(chunk_path(Path::new("d"), 3), Path::new("d/__3.blp"));
        assert_eq!(chunk_index("__12.blp"), Some(12));
        assert_eq!(chunk_index("sizes"), None);
    }

    #[test]
    fn disk_chunk_decodes() {
        let dir = TempDir::new().unwrap();
        let values = Array::from(vec![1.5f64, -2.0, 3.25]);
        let path = chunk_path(dir.path(), 0);
        let chunk = Chunk::encode(&values, CompressionParams::default(), Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(chunk.decode(&DType::F64).unwrap(), values);
        let reopened = Chunk::on_disk(path).unwrap();
        assert_eq!(reopened.cbytes(), chunk.cbytes());
    }
}
