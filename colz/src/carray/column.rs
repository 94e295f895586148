use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use colz_array::compute::{NumericOp, binary_numeric, sum};
use colz_array::{Array, Datum, Scalar};
use colz_dtype::DType;
use colz_error::{ColzResult, ResultExt, colz_bail, colz_err};
use itertools::Itertools;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::carray::chunk::{
    Chunk, DEFAULT_EXPECTEDLEN, calc_chunklen, chunk_index, chunk_path,
};
use crate::carray::{ColumnOptions, CompressionParams, OpenMode};
use crate::config::{config, thread_pool};
use crate::slice::Slice;

const META_DIR: &str = "meta";
const DATA_DIR: &str = "data";
const STORAGE_FILE: &str = "storage";
const SIZES_FILE: &str = "sizes";

#[derive(Debug, Serialize, Deserialize)]
struct StorageMeta {
    dtype: DType,
    chunklen: usize,
    expectedlen: usize,
    cparams: CompressionParams,
    dflt: Scalar,
}

#[derive(Debug, Serialize, Deserialize)]
struct SizesMeta {
    len: usize,
    nbytes: usize,
    cbytes: usize,
}

/// Whether `path` holds a persisted column.
pub(crate) fn is_column_dir(path: &Path) -> bool {
    path.join(META_DIR).join(STORAGE_FILE).is_file()
}

fn read_meta<T: DeserializeOwned>(path: &Path) -> ColzResult<T> {
    let bytes = fs::read(path).context(|| format!("reading '{}'", path.display()))?;
    serde_json::from_slice(&bytes).context(|| format!("parsing '{}'", path.display()))
}

/// `path` made absolute with symlinks and `..` resolved, as far as it exists.
///
/// Components below the deepest existing ancestor are applied lexically.
fn resolve_path(path: &Path) -> ColzResult<PathBuf> {
    let mut missing = Vec::new();
    let mut existing = path;
    while !existing.as_os_str().is_empty() && !existing.exists() {
        missing.extend(existing.components().next_back());
        existing = existing.parent().unwrap_or_else(|| Path::new(""));
    }
    let mut resolved = if existing.as_os_str().is_empty() {
        std::env::current_dir()?
    } else {
        fs::canonicalize(existing)?
    };
    for component in missing.into_iter().rev() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}

/// Fail if writing a new object at `dest` could clobber the persisted object at `source`.
///
/// The paths conflict when they name the same directory or one lies inside the other,
/// however they are spelled.
pub(crate) fn check_overlap(source: &Path, dest: &Path) -> ColzResult<()> {
    let (source_abs, dest_abs) = (resolve_path(source)?, resolve_path(dest)?);
    if source_abs.starts_with(&dest_abs) || dest_abs.starts_with(&source_abs) {
        colz_bail!(
            PersistenceConflict: "'{}' overlaps the persisted data in '{}'",
            dest.display(),
            source.display()
        );
    }
    Ok(())
}

/// Make `root` ready to receive a new persisted object opened with `mode`.
pub(crate) fn prepare_root(root: &Path, mode: OpenMode) -> ColzResult<()> {
    match mode {
        OpenMode::Read => {
            colz_bail!(ModeViolation: "cannot create '{}' in read mode", root.display())
        }
        OpenMode::Write => {
            if root.exists() {
                log::debug!("removing existing '{}'", root.display());
                fs::remove_dir_all(root)?;
            }
        }
        OpenMode::Append => {
            if root.exists() {
                colz_bail!(
                    PersistenceConflict: "'{}' already exists, open it or create it in write mode",
                    root.display()
                );
            }
        }
    }
    Ok(())
}

/// A resizable sequence of fixed-width values stored as independently compressed chunks.
///
/// All chunks but the tail hold exactly `chunklen` values; the tail (`leftover`) is kept
/// uncompressed in memory until it fills up, and is written as the last chunk file when a
/// persisted column is flushed.
#[derive(Debug)]
pub struct Column {
    dtype: DType,
    chunklen: usize,
    expectedlen: usize,
    cparams: CompressionParams,
    dflt: Scalar,
    chunks: Vec<Chunk>,
    leftover: Array,
    len: usize,
    root: Option<PathBuf>,
    mode: OpenMode,
    cache: Mutex<Option<(usize, Arc<Array>)>>,
    dirty: bool,
}

impl Column {
    /// A column holding a copy of `data`.
    pub fn new(data: &Array, mut options: ColumnOptions) -> ColzResult<Self> {
        options.expectedlen = options.expectedlen.or(Some(data.len()));
        let mut column = Self::empty(&data.dtype(), options)?;
        column.append(data)?;
        column.flush()?;
        Ok(column)
    }

    /// An empty column of `dtype`.
    ///
    /// With a root, the directory is created according to the mode: [`OpenMode::Write`]
    /// replaces an existing directory, [`OpenMode::Append`] refuses to and
    /// [`OpenMode::Read`] cannot create anything.
    pub fn empty(dtype: &DType, options: ColumnOptions) -> ColzResult<Self> {
        if !dtype.is_fixed_scalar() {
            colz_bail!("columns hold fixed-width values, not {dtype}");
        }
        let expectedlen = options.expectedlen.unwrap_or(DEFAULT_EXPECTEDLEN);
        let chunklen = match options.chunklen {
            Some(0) => colz_bail!("chunklen must be positive"),
            Some(chunklen) => chunklen,
            None => calc_chunklen(expectedlen, dtype.byte_width()),
        };
        let dflt = match &options.dflt {
            Some(dflt) => dflt.cast(dtype)?,
            None => Scalar::zero(dtype)?,
        };
        let mut column = Self {
            dtype: dtype.clone(),
            chunklen,
            expectedlen,
            cparams: options.cparams.unwrap_or_else(|| config().cparams),
            dflt,
            chunks: Vec::new(),
            leftover: Array::with_capacity(dtype, chunklen.min(DEFAULT_EXPECTEDLEN))?,
            len: 0,
            root: None,
            mode: OpenMode::Append,
            cache: Mutex::new(None),
            dirty: false,
        };
        if let Some(root) = options.root {
            prepare_root(&root, options.mode)?;
            fs::create_dir_all(root.join(META_DIR))?;
            fs::create_dir_all(root.join(DATA_DIR))?;
            column.root = Some(root);
            column.write_storage()?;
            column.write_sizes()?;
        }
        log::debug!(
            "created {} column with chunklen {chunklen} (expectedlen {expectedlen})",
            column.dtype
        );
        Ok(column)
    }

    /// Open a persisted column.
    pub fn open(root: impl AsRef<Path>, mode: OpenMode) -> ColzResult<Self> {
        let root = root.as_ref();
        if mode == OpenMode::Write {
            colz_bail!(
                "'{}' cannot be opened in write mode, create a new column instead",
                root.display()
            );
        }
        if !is_column_dir(root) {
            colz_bail!("'{}' is not a column directory", root.display());
        }
        let storage: StorageMeta = read_meta(&root.join(META_DIR).join(STORAGE_FILE))?;
        let sizes: SizesMeta = read_meta(&root.join(META_DIR).join(SIZES_FILE))?;
        if storage.chunklen == 0 || !storage.dtype.is_fixed_scalar() {
            colz_bail!(InvalidSerde: "bad storage metadata in '{}'", root.display());
        }

        let data_dir = root.join(DATA_DIR);
        let nfull = sizes.len / storage.chunklen;
        let chunks = (0..nfull)
            .map(|i| Chunk::on_disk(chunk_path(&data_dir, i)))
            .collect::<ColzResult<Vec<_>>>()?;
        let leftover = if sizes.len % storage.chunklen > 0 {
            Chunk::on_disk(chunk_path(&data_dir, nfull))?.decode(&storage.dtype)?
        } else {
            Array::empty(&storage.dtype)?
        };
        if nfull * storage.chunklen + leftover.len() != sizes.len {
            colz_bail!(
                InvalidSerde: "'{}' should hold {} values but its chunks hold {}",
                root.display(),
                sizes.len,
                nfull * storage.chunklen + leftover.len()
            );
        }

        Ok(Self {
            dtype: storage.dtype,
            chunklen: storage.chunklen,
            expectedlen: storage.expectedlen,
            cparams: storage.cparams,
            dflt: storage.dflt,
            chunks,
            leftover,
            len: sizes.len,
            root: Some(root.to_path_buf()),
            mode,
            cache: Mutex::new(None),
            dirty: false,
        })
    }

    pub fn dtype(&self) -> &DType {
        &self.dtype
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunklen(&self) -> usize {
        self.chunklen
    }

    pub fn expectedlen(&self) -> usize {
        self.expectedlen
    }

    /// Number of full, compressed chunks. The partially filled tail is not counted.
    pub fn nchunks(&self) -> usize {
        self.chunks.len()
    }

    /// Size of the values, uncompressed.
    pub fn nbytes(&self) -> usize {
        self.len * self.dtype.byte_width()
    }

    /// Size of the stored chunks plus the uncompressed tail.
    pub fn cbytes(&self) -> usize {
        self.chunks.iter().map(Chunk::cbytes).sum::<usize>() + self.leftover.nbytes()
    }

    pub fn cparams(&self) -> CompressionParams {
        self.cparams
    }

    /// The value new elements take when the column is resized up.
    pub fn dflt(&self) -> Scalar {
        self.dflt
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    fn check_writable(&self) -> ColzResult<()> {
        if !self.mode.is_writable() {
            colz_bail!(ModeViolation: "column is opened read-only");
        }
        Ok(())
    }

    fn data_dir(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(DATA_DIR))
    }

    /// Append `data`, cast to the column's dtype, and return the new length.
    pub fn append(&mut self, data: &Array) -> ColzResult<usize> {
        self.check_writable()?;
        let data = data.cast(&self.dtype)?;
        if data.is_empty() {
            return Ok(self.len);
        }
        self.leftover.extend(&data)?;

        let nfull = self.leftover.len() / self.chunklen;
        if nfull > 0 {
            let split = nfull * self.chunklen;
            let full = (0..nfull)
                .map(|i| self.leftover.slice(i * self.chunklen, (i + 1) * self.chunklen))
                .collect::<ColzResult<Vec<_>>>()?;
            let chunks = self.encode_chunks(self.chunks.len(), &full)?;
            self.chunks.extend(chunks);
            self.leftover = self.leftover.slice(split, self.leftover.len())?;
        }

        self.len += data.len();
        self.dirty = true;
        Ok(self.len)
    }

    /// Compress `arrays` into chunks numbered from `first`, in parallel when configured.
    fn encode_chunks(&self, first: usize, arrays: &[Array]) -> ColzResult<Vec<Chunk>> {
        let data_dir = self.data_dir();
        let cparams = self.cparams;
        let encode = |(i, array): (usize, &Array)| {
            let path = data_dir.as_ref().map(|dir| chunk_path(dir, first + i));
            Chunk::encode(array, cparams, path.as_deref())
        };
        match thread_pool() {
            Some(pool) if arrays.len() > 1 => pool.install(|| {
                arrays
                    .par_iter()
                    .enumerate()
                    .map(encode)
                    .collect::<ColzResult<Vec<_>>>()
            }),
            _ => arrays.iter().enumerate().map(encode).collect(),
        }
    }

    /// Remove the last `n` values.
    pub fn trim(&mut self, n: usize) -> ColzResult<()> {
        self.check_writable()?;
        if n > self.len {
            colz_bail!("cannot trim {n} values from a column of length {}", self.len);
        }
        let new_len = self.len - n;
        let stored = self.chunks.len() * self.chunklen;
        if new_len >= stored {
            self.leftover.truncate(new_len - stored);
        } else {
            let nfull = new_len / self.chunklen;
            let tail = new_len % self.chunklen;
            self.leftover = if tail > 0 {
                let mut reopened = self.chunks[nfull].decode(&self.dtype)?;
                reopened.truncate(tail);
                reopened
            } else {
                Array::empty(&self.dtype)?
            };
            self.chunks.truncate(nfull);
            self.cache.lock().take();
        }
        self.len = new_len;
        self.dirty = true;
        Ok(())
    }

    /// Grow with the default value or shrink to exactly `len` values.
    pub fn resize(&mut self, len: usize) -> ColzResult<()> {
        if len < self.len {
            self.trim(self.len - len)
        } else {
            self.append(&Array::full(self.dflt, len - self.len)).map(|_| ())
        }
    }

    /// Decompress chunk `index`, serving repeated reads from a one-chunk cache.
    fn chunk(&self, index: usize) -> ColzResult<Arc<Array>> {
        let mut cache = self.cache.lock();
        if let Some((cached, array)) = cache.as_ref() {
            if *cached == index {
                return Ok(array.clone());
            }
        }
        let array = Arc::new(self.chunks[index].decode(&self.dtype)?);
        *cache = Some((index, array.clone()));
        Ok(array)
    }

    /// Visit the stored values in `start..stop` a chunk at a time.
    fn for_each_range(
        &self,
        start: usize,
        stop: usize,
        mut f: impl FnMut(&Array, usize, usize) -> ColzResult<()>,
    ) -> ColzResult<()> {
        if start > stop || stop > self.len {
            colz_bail!(OutOfBounds: stop, start, self.len);
        }
        let stored = self.chunks.len() * self.chunklen;
        let mut pos = start;
        while pos < stop.min(stored) {
            let index = pos / self.chunklen;
            let offset = index * self.chunklen;
            let end = stop.min(offset + self.chunklen);
            f(&*self.chunk(index)?, pos - offset, end - offset)?;
            pos = end;
        }
        if pos < stop {
            f(&self.leftover, pos - stored, stop - stored)?;
        }
        Ok(())
    }

    pub fn scalar_at(&self, index: usize) -> ColzResult<Scalar> {
        if index >= self.len {
            colz_bail!(OutOfBounds: index, 0, self.len);
        }
        let stored = self.chunks.len() * self.chunklen;
        if index >= stored {
            self.leftover.scalar_at(index - stored)
        } else {
            self.chunk(index / self.chunklen)?
                .scalar_at(index % self.chunklen)
        }
    }

    /// The values in `start..stop`.
    pub fn read_range(&self, start: usize, stop: usize) -> ColzResult<Array> {
        let mut out = Array::with_capacity(&self.dtype, stop.saturating_sub(start))?;
        self.read_range_into(start, stop.saturating_sub(start), &mut out)?;
        Ok(out)
    }

    /// Replace the contents of `out` with the `len` values starting at `offset`.
    ///
    /// `out` keeps its allocation when it already has the column's dtype.
    pub fn read_range_into(&self, offset: usize, len: usize, out: &mut Array) -> ColzResult<()> {
        if out.dtype() != self.dtype {
            *out = Array::with_capacity(&self.dtype, len)?;
        }
        out.clear();
        self.for_each_range(offset, offset + len, |array, start, stop| {
            if start == 0 && stop == array.len() {
                out.extend(array)
            } else {
                out.extend(&array.slice(start, stop)?)
            }
        })
    }

    pub fn slice(&self, slice: Slice) -> ColzResult<Array> {
        let indices = slice.indices(self.len)?;
        if indices.is_empty() {
            return Array::empty(&self.dtype);
        }
        let values = self.read_range(indices.start, indices.stop)?;
        if indices.step == 1 {
            return Ok(values);
        }
        let positions = (0..values.len()).step_by(indices.step).collect::<Vec<_>>();
        values.take(&positions)
    }

    /// Gather the values at `indices`, in order.
    pub fn take(&self, indices: &[usize]) -> ColzResult<Array> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len) {
            colz_bail!(OutOfBounds: bad, 0, self.len);
        }
        let stored = self.chunks.len() * self.chunklen;
        let mut out = Array::with_capacity(&self.dtype, indices.len())?;
        // Runs of indices that fall in the same chunk are gathered together.
        for (index, run) in &indices.iter().chunk_by(|&&i| i / self.chunklen) {
            let local = run.map(|&i| i % self.chunklen).collect::<Vec<_>>();
            if index * self.chunklen >= stored {
                out.extend(&self.leftover.take(&local)?)?;
            } else {
                out.extend(&self.chunk(index)?.take(&local)?)?;
            }
        }
        Ok(out)
    }

    /// The values where `mask` is `true`.
    pub fn filter(&self, mask: &[bool]) -> ColzResult<Array> {
        if mask.len() != self.len {
            colz_bail!(
                "mask of length {} does not match column of length {}",
                mask.len(),
                self.len
            );
        }
        self.take(&mask_positions(mask))
    }

    pub fn set_scalar(&mut self, index: usize, value: Scalar) -> ColzResult<()> {
        self.set_indices(&[index], &Datum::Scalar(value))
    }

    pub fn set_slice(&mut self, slice: Slice, value: &Datum) -> ColzResult<()> {
        let positions = slice.indices(self.len)?.positions().collect::<Vec<_>>();
        self.set_indices(&positions, value)
    }

    pub fn set_mask(&mut self, mask: &[bool], value: &Datum) -> ColzResult<()> {
        if mask.len() != self.len {
            colz_bail!(
                "mask of length {} does not match column of length {}",
                mask.len(),
                self.len
            );
        }
        self.set_indices(&mask_positions(mask), value)
    }

    /// Overwrite the values at `indices` with `value`, a scalar or one value per index.
    ///
    /// Every touched chunk is decompressed, updated and compressed again.
    pub fn set_indices(&mut self, indices: &[usize], value: &Datum) -> ColzResult<()> {
        self.check_writable()?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len) {
            colz_bail!(OutOfBounds: bad, 0, self.len);
        }
        let values = match value {
            Datum::Scalar(s) => Datum::Scalar(s.cast(&self.dtype)?),
            Datum::Array(a) if a.len() == indices.len() => Datum::Array(a.cast(&self.dtype)?),
            Datum::Array(a) => colz_bail!(
                "cannot assign {} values to {} positions",
                a.len(),
                indices.len()
            ),
        };
        let value_at = |pos: usize| match &values {
            Datum::Scalar(s) => Ok(*s),
            Datum::Array(a) => a.scalar_at(pos),
        };

        let mut by_chunk: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
        for (pos, &i) in indices.iter().enumerate() {
            by_chunk
                .entry(i / self.chunklen)
                .or_default()
                .push((i % self.chunklen, pos));
        }

        let data_dir = self.data_dir();
        for (index, updates) in by_chunk {
            if index >= self.chunks.len() {
                for (local, pos) in updates {
                    self.leftover.set(local, &value_at(pos)?)?;
                }
                continue;
            }
            let mut array = self.chunks[index].decode(&self.dtype)?;
            for (local, pos) in updates {
                array.set(local, &value_at(pos)?)?;
            }
            let path = data_dir.as_ref().map(|dir| chunk_path(dir, index));
            self.chunks[index] = Chunk::encode(&array, self.cparams, path.as_deref())?;
        }
        self.cache.lock().take();
        self.dirty = true;
        Ok(())
    }

    /// Sum of all values: `i64` for booleans and integers, `f64` for floats.
    pub fn sum(&self) -> ColzResult<Scalar> {
        let mut total = Datum::Scalar(sum(&Datum::Array(Array::empty(&self.dtype)?))?);
        self.for_each_range(0, self.len, |array, start, stop| {
            let part = if start == 0 && stop == array.len() {
                sum(&Datum::Array(array.clone()))?
            } else {
                sum(&Datum::Array(array.slice(start, stop)?))?
            };
            total = binary_numeric(&total, &Datum::Scalar(part), NumericOp::Add)?;
            Ok(())
        })?;
        total
            .as_scalar()
            .copied()
            .ok_or_else(|| colz_err!(InvariantViolation: "sum did not reduce to a scalar"))
    }

    /// Write the tail chunk and size metadata of a persisted column.
    pub fn flush(&mut self) -> ColzResult<()> {
        let Some(data_dir) = self.data_dir() else {
            return Ok(());
        };
        if !self.dirty || !self.mode.is_writable() {
            return Ok(());
        }
        let mut nfiles = self.chunks.len();
        if !self.leftover.is_empty() {
            Chunk::encode(
                &self.leftover,
                self.cparams,
                Some(&chunk_path(&data_dir, nfiles)),
            )?;
            nfiles += 1;
        }
        for entry in fs::read_dir(&data_dir)? {
            let entry = entry?;
            let stale = entry
                .file_name()
                .to_str()
                .and_then(chunk_index)
                .is_some_and(|i| i >= nfiles);
            if stale {
                fs::remove_file(entry.path())?;
            }
        }
        self.write_sizes()?;
        self.dirty = false;
        Ok(())
    }

    fn write_storage(&self) -> ColzResult<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let meta = StorageMeta {
            dtype: self.dtype.clone(),
            chunklen: self.chunklen,
            expectedlen: self.expectedlen,
            cparams: self.cparams,
            dflt: self.dflt,
        };
        fs::write(
            root.join(META_DIR).join(STORAGE_FILE),
            serde_json::to_vec(&meta)?,
        )?;
        Ok(())
    }

    fn write_sizes(&self) -> ColzResult<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let meta = SizesMeta {
            len: self.len,
            nbytes: self.nbytes(),
            cbytes: self.cbytes(),
        };
        fs::write(
            root.join(META_DIR).join(SIZES_FILE),
            serde_json::to_vec(&meta)?,
        )?;
        Ok(())
    }

    /// A copy of this column, recompressed with `options`.
    ///
    /// Unset options keep this column's compression, chunk length and default value.
    pub fn copy(&self, mut options: ColumnOptions) -> ColzResult<Self> {
        if let (Some(from), Some(to)) = (&self.root, &options.root) {
            check_overlap(from, to)?;
        }
        options.cparams = options.cparams.or(Some(self.cparams));
        options.dflt = options.dflt.or(Some(self.dflt));
        if options.chunklen.is_none() && options.expectedlen.is_none() {
            options.chunklen = Some(self.chunklen);
        }
        options.expectedlen = options.expectedlen.or(Some(self.expectedlen));
        let mut copy = Self::empty(&self.dtype, options)?;
        self.for_each_range(0, self.len, |array, start, stop| {
            copy.append(&array.slice(start, stop)?).map(|_| ())
        })?;
        copy.flush()?;
        Ok(copy)
    }

    /// Delete the persisted directory, leaving an empty in-memory column behind.
    pub fn purge(&mut self) -> ColzResult<()> {
        self.check_writable()?;
        if let Some(root) = self.root.take() {
            fs::remove_dir_all(&root)?;
            log::debug!("purged column '{}'", root.display());
        }
        self.chunks.clear();
        self.leftover.clear();
        self.len = 0;
        self.cache.lock().take();
        self.dirty = false;
        Ok(())
    }

    fn preview(&self) -> ColzResult<String> {
        const EDGE: usize = 3;
        if self.len <= 2 * EDGE {
            return Ok(self.read_range(0, self.len)?.to_string());
        }
        let head = self.read_range(0, EDGE)?.scalars().join(", ");
        let tail = self.read_range(self.len - EDGE, self.len)?.scalars().join(", ");
        Ok(format!("[{head}, ..., {tail}]"))
    }
}

pub(crate) fn mask_positions(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &keep)| keep.then_some(i))
        .collect()
}

impl Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ratio = if self.cbytes() == 0 {
            0.0
        } else {
            self.nbytes() as f64 / self.cbytes() as f64
        };
        writeln!(f, "carray(({},), {})", self.len, self.dtype)?;
        writeln!(
            f,
            "  nbytes := {}; cbytes := {}; ratio: {ratio:.2}",
            self.nbytes(),
            self.cbytes()
        )?;
        writeln!(f, "  {}; chunklen := {}", self.cparams, self.chunklen)?;
        if let Some(root) = &self.root {
            writeln!(f, "  rootdir := '{}'; mode := {}", root.display(), self.mode)?;
        }
        write!(f, "{}", self.preview().map_err(|_| std::fmt::Error)?)
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            log::warn!("failed to flush column on drop: {err}");
        }
    }
}
