use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use colz_error::ColzResult;

use crate::carray::{Column, OpenMode, is_column_dir};
use crate::ctable::{Table, is_table_dir};

/// The kinds of objects persisted on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Column,
    Table,
}

impl ObjectKind {
    /// The kind of object persisted at `path`, if there is one.
    pub fn of(path: &Path) -> Option<Self> {
        if is_table_dir(path) {
            return Some(ObjectKind::Table);
        }
        is_column_dir(path).then_some(ObjectKind::Column)
    }
}

/// A persisted object found by [`walk`].
#[derive(Debug)]
pub enum Node {
    Column(Column),
    Table(Table),
}

impl Node {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Node::Column(_) => ObjectKind::Column,
            Node::Table(_) => ObjectKind::Table,
        }
    }

    pub fn root(&self) -> Option<&Path> {
        match self {
            Node::Column(c) => c.root(),
            Node::Table(t) => t.root(),
        }
    }
}

/// Depth-first discovery of persisted objects. See [`walk`].
pub struct Walk {
    kind: Option<ObjectKind>,
    mode: OpenMode,
    found: VecDeque<(ObjectKind, PathBuf)>,
    /// Directories still to scan, the next one last.
    dirs: Vec<PathBuf>,
}

impl Walk {
    fn keep(&mut self, kind: ObjectKind, path: PathBuf) {
        if self.kind.is_none_or(|k| k == kind) {
            self.found.push_back((kind, path));
        }
    }

    fn scan(&mut self, dir: &Path) -> ColzResult<()> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                entries.push(path);
            }
        }
        entries.sort();
        let mut subdirs = Vec::new();
        for path in entries {
            match ObjectKind::of(&path) {
                Some(kind) => self.keep(kind, path),
                None => subdirs.push(path),
            }
        }
        self.dirs.extend(subdirs.into_iter().rev());
        Ok(())
    }

    fn open(&self, kind: ObjectKind, path: &Path) -> ColzResult<Node> {
        Ok(match kind {
            ObjectKind::Column => Node::Column(Column::open(path, self.mode)?),
            ObjectKind::Table => Node::Table(Table::open(path, self.mode)?),
        })
    }
}

impl Iterator for Walk {
    type Item = ColzResult<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((kind, path)) = self.found.pop_front() {
                return Some(self.open(kind, &path));
            }
            let dir = self.dirs.pop()?;
            if let Err(err) = self.scan(&dir) {
                return Some(Err(err));
            }
        }
    }
}

/// Every column and table persisted below `root`, opened with `mode`.
///
/// Within a directory the objects come first, in name order, followed by the contents of
/// its other subdirectories. Objects are not searched for nested objects, so the columns of
/// a table are not reported separately. A `root` that is itself an object yields just that
/// object. `kind` restricts the walk to one kind of object.
pub fn walk(root: impl AsRef<Path>, kind: Option<ObjectKind>, mode: OpenMode) -> Walk {
    let root = root.as_ref().to_path_buf();
    let mut walk = Walk {
        kind,
        mode,
        found: VecDeque::new(),
        dirs: Vec::new(),
    };
    match ObjectKind::of(&root) {
        Some(found) => walk.keep(found, root),
        None => walk.dirs.push(root),
    }
    walk
}

#[cfg(test)]
mod test {
    use colz_array::Array;
    use tempfile::TempDir;

    use super::*;
    use crate::{ColumnOptions, ColumnSource, TableOptions};

    fn column_at(path: PathBuf) {
        Column::new(
            &Array::from(vec![1i64, 2, 3]),
            ColumnOptions::default().with_root(path),
        )
        .unwrap();
    }

    fn table_at(path: PathBuf) {
        Table::new(
            ColumnSource::Arrays(vec![Array::from(vec![1.0f64])]),
            TableOptions::default().with_root(path),
        )
        .unwrap();
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        table_at(root.join("t1"));
        column_at(root.join("c0"));
        column_at(root.join("sub").join("c1"));
        table_at(root.join("sub").join("deeper").join("t2"));
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("notes.txt"), "not an object").unwrap();
        dir
    }

    fn found(dir: &TempDir, kind: Option<ObjectKind>) -> Vec<(ObjectKind, PathBuf)> {
        walk(dir.path(), kind, OpenMode::Read)
            .map(|node| {
                let node = node.unwrap();
                let path = node.root().unwrap().strip_prefix(dir.path()).unwrap().to_path_buf();
                (node.kind(), path)
            })
            .collect()
    }

    #[test]
    fn objects_before_subdirectories() {
        let dir = tree();
        assert_eq!(
            found(&dir, None),
            [
                (ObjectKind::Column, PathBuf::from("c0")),
                (ObjectKind::Table, PathBuf::from("t1")),
                (ObjectKind::Column, PathBuf::from("sub/c1")),
                (ObjectKind::Table, PathBuf::from("sub/deeper/t2")),
            ]
        );
    }

    #[test]
    fn filters_by_kind() {
        let dir = tree();
        let tables = found(&dir, Some(ObjectKind::Table));
        assert_eq!(
            tables.iter().map(|(_, p)| p.clone()).collect::<Vec<_>>(),
            [PathBuf::from("t1"), PathBuf::from("sub/deeper/t2")]
        );
    }

    #[test]
    fn root_object_is_reported_alone() {
        let dir = tree();
        let nodes = walk(dir.path().join("t1"), None, OpenMode::Read)
            .collect::<ColzResult<Vec<_>>>()
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind(), ObjectKind::Table);
    }

    #[test]
    fn missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let mut nodes = walk(dir.path().join("nope"), None, OpenMode::Read);
        assert!(nodes.next().unwrap().is_err());
        assert!(nodes.next().is_none());
    }
}
