//! Cache export.
//!
//! Writes the field and object caches of a finished pass as one JSON file per
//! template, then a manifest describing the output tree so a static server can
//! answer listing queries without touching the filesystem.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use webdoc_core::TemplateId;

use crate::{fields::FieldCache, objects::ObjectCache, store::TemplateStore};

/// Cache export errors.
#[derive(Debug, Error)]
pub enum WriteError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("failed to serialize {path}: {source}")]
    Json {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Output tree scan error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// One node of the structure manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StructureNode {
    /// A directory and its sorted children.
    Directory {
        /// Entry name.
        name: String,
        /// Child entries, sorted by name.
        children: Vec<StructureNode>,
    },
    /// A regular file.
    File {
        /// Entry name.
        name: String,
        /// Size in bytes.
        size: u64,
    },
}

impl StructureNode {
    /// Entry name.
    pub fn name(&self) -> &str {
        match self {
            Self::Directory { name, .. } | Self::File { name, .. } => name,
        }
    }

    /// Child named `name`, if this is a directory.
    pub fn child(&self, name: &str) -> Option<&StructureNode> {
        match self {
            Self::Directory { children, .. } => children.iter().find(|c| c.name() == name),
            Self::File { .. } => None,
        }
    }

    /// Number of files below this node.
    pub fn file_count(&self) -> usize {
        match self {
            Self::Directory { children, .. } => children.iter().map(Self::file_count).sum(),
            Self::File { .. } => 1,
        }
    }
}

/// Counts of files written by [`CacheWriter::write`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteStats {
    /// Field cache files.
    pub field_files: usize,
    /// Object cache files.
    pub object_files: usize,
}

impl WriteStats {
    /// All data files including the manifest.
    pub fn total(&self) -> usize {
        self.field_files + self.object_files + 1
    }
}

/// Writes pass caches below the data root.
#[derive(Debug)]
pub struct CacheWriter<'a> {
    store: &'a TemplateStore,
    pretty: bool,
}

impl<'a> CacheWriter<'a> {
    /// Create a writer; `pretty` selects indented JSON.
    pub fn new(store: &'a TemplateStore, pretty: bool) -> Self {
        Self { store, pretty }
    }

    /// Write both caches, then the structure manifest.
    pub fn write(&self, fields: &FieldCache, objects: &ObjectCache) -> Result<WriteStats> {
        let paths = self.store.paths();

        let field_entries: Vec<_> = fields.iter().collect();
        let field_files = self.write_all(&paths.fields, &field_entries)?;

        let object_entries: Vec<_> = objects.iter().collect();
        let object_files = self.write_all(&paths.objects, &object_entries)?;

        let manifest = self.write_structure()?;
        info!(
            fields = field_files,
            objects = object_files,
            files = manifest.file_count(),
            "wrote data caches"
        );

        Ok(WriteStats {
            field_files,
            object_files,
        })
    }

    fn write_all<T>(&self, root: &Path, entries: &[(&TemplateId, &T)]) -> Result<usize>
    where
        T: Serialize + Sync,
    {
        fs::create_dir_all(root)?;
        entries
            .par_iter()
            .map(|(id, data)| {
                let path = self.store.data_file_for(root, id);
                self.write_json(&path, data)
            })
            .collect::<Result<Vec<()>>>()?;
        Ok(entries.len())
    }

    /// Scan the output root and write the manifest.
    pub fn write_structure(&self) -> Result<StructureNode> {
        let paths = self.store.paths();
        let manifest = scan_structure(&paths.output, &paths.structure)?;
        self.write_json(&paths.structure, &manifest)?;
        Ok(manifest)
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|source| WriteError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        debug!(path = %path.display(), "wrote data file");
        Ok(())
    }
}

/// Describe the tree below `root`, leaving out `exclude`.
pub fn scan_structure(root: &Path, exclude: &Path) -> Result<StructureNode> {
    // Open directories from the root down; index == walk depth.
    let mut open: Vec<(String, Vec<StructureNode>)> = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        while open.len() > entry.depth() {
            close_directory(&mut open);
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().is_dir() {
            open.push((name, Vec::new()));
        } else if entry.path() != exclude {
            let size = entry.metadata()?.len();
            if let Some((_, children)) = open.last_mut() {
                children.push(StructureNode::File { name, size });
            }
        }
    }

    while open.len() > 1 {
        close_directory(&mut open);
    }

    let (name, children) = open.pop().unwrap_or_default();
    Ok(StructureNode::Directory { name, children })
}

fn close_directory(open: &mut Vec<(String, Vec<StructureNode>)>) {
    if let Some((name, children)) = open.pop() {
        let node = StructureNode::Directory { name, children };
        if let Some((_, parent)) = open.last_mut() {
            parent.push(node);
        }
    }
}
