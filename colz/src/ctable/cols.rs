use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use colz_dtype::FieldName;
use colz_error::{ColzResult, colz_bail, colz_err};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::carray::{Column, ColumnRef, OpenMode};

/// The metadata file naming the columns of a persisted table.
pub(crate) const ROOTDIRS: &str = "__rootdirs__";

#[derive(Debug, Serialize, Deserialize)]
struct RootDirs {
    names: Vec<String>,
    dirs: BTreeMap<String, String>,
}

/// Whether `path` holds a persisted table.
pub(crate) fn is_table_dir(path: &Path) -> bool {
    path.join(ROOTDIRS).is_file()
}

/// The ordered columns of a table.
///
/// Column order is the order of the fields of each row and of the names recorded on disk.
#[derive(Debug, Clone, Default)]
pub(crate) struct ColumnDirectory {
    names: Vec<FieldName>,
    columns: FxHashMap<FieldName, ColumnRef>,
    root: Option<PathBuf>,
}

impl ColumnDirectory {
    pub(crate) fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    /// Open every column recorded under `root`.
    pub(crate) fn open(root: &Path, mode: OpenMode) -> ColzResult<Self> {
        let meta: RootDirs = serde_json::from_slice(&fs::read(root.join(ROOTDIRS))?)?;
        let mut cols = Self::new(Some(root.to_path_buf()));
        for name in &meta.names {
            let dir = meta
                .dirs
                .get(name)
                .ok_or_else(|| colz_err!(InvalidSerde: "no directory recorded for column '{name}'"))?;
            let column = Column::open(root.join(dir), mode)?;
            cols.insert(cols.len(), FieldName::from(name.as_str()), column.into())?;
        }
        Ok(cols)
    }

    pub(crate) fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Where the column called `name` is persisted, if the table is.
    pub(crate) fn column_root(&self, name: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(name))
    }

    pub(crate) fn names(&self) -> &[FieldName] {
        &self.names
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.as_ref() == name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&ColumnRef> {
        self.columns.get(name)
    }

    /// Columns in order, with their names.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&FieldName, &ColumnRef)> + '_ {
        self.names
            .iter()
            .filter_map(|name| self.columns.get(name).map(|column| (name, column)))
    }

    pub(crate) fn columns(&self) -> impl Iterator<Item = &ColumnRef> + '_ {
        self.iter().map(|(_, column)| column)
    }

    pub(crate) fn insert(&mut self, pos: usize, name: FieldName, column: ColumnRef) -> ColzResult<()> {
        if pos > self.names.len() {
            colz_bail!(InvariantViolation: "position {pos} is past the last column");
        }
        if self.columns.contains_key(&name) {
            colz_bail!(InvariantViolation: "column '{name}' already exists");
        }
        self.names.insert(pos, name.clone());
        self.columns.insert(name, column);
        Ok(())
    }

    pub(crate) fn remove(&mut self, pos: usize) -> ColzResult<(FieldName, ColumnRef)> {
        if pos >= self.names.len() {
            colz_bail!(InvariantViolation: "no column at position {pos}");
        }
        let name = self.names.remove(pos);
        let column = self
            .columns
            .remove(&name)
            .ok_or_else(|| colz_err!(InvariantViolation: "column '{name}' is not registered"))?;
        Ok((name, column))
    }

    /// Record the column layout on disk, replacing the previous record in one rename.
    pub(crate) fn save(&self) -> ColzResult<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let meta = RootDirs {
            names: self.names.iter().map(|n| n.to_string()).collect(),
            dirs: self
                .names
                .iter()
                .map(|n| (n.to_string(), n.to_string()))
                .collect(),
        };
        let tmp = root.join(format!("{ROOTDIRS}.tmp"));
        fs::write(&tmp, serde_json::to_vec(&meta)?)?;
        fs::rename(&tmp, root.join(ROOTDIRS))?;
        log::debug!(
            "recorded {} columns in '{}'",
            self.names.len(),
            root.display()
        );
        Ok(())
    }
}
