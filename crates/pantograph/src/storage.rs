//! Storage contracts for diagram documents.
//!
//! A [`StorageProvider`] exposes named repositories, each holding diagram
//! files. The traits are the seam between the editor core and whatever
//! backend actually persists documents; all methods are fallible and a
//! failed operation must leave the caller's in-memory working set exactly
//! as it was.
//!
//! [`MemoryProvider`] is the bundled backend, used by tests and as the
//! scratch store for the CLI.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use pantograph_core::model::DiagramModel;

use crate::error::PantographError;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No repository named '{0}'")]
    RepositoryNotFound(String),

    #[error("No file named '{0}'")]
    FileNotFound(String),

    #[error("A file named '{0}' already exists")]
    FileExists(String),

    #[error("File '{0}' is read-only")]
    ReadOnly(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// A handle to one stored diagram file.
pub trait FileHandle {
    fn name(&self) -> String;

    /// Whether [`FileHandle::write`] and [`FileHandle::delete`] may
    /// succeed. Read-only handles fail those operations with
    /// [`StorageError::ReadOnly`].
    fn is_writable(&self) -> bool;

    fn read(&self) -> Result<String, StorageError>;

    fn write(&self, content: &str) -> Result<(), StorageError>;

    fn delete(&self) -> Result<(), StorageError>;
}

/// A named collection of diagram files.
pub trait Repository {
    fn name(&self) -> String;

    fn list_files(&self) -> Result<Vec<Box<dyn FileHandle>>, StorageError>;

    /// Creates a new file with the given content. Fails if the name is
    /// already taken.
    fn create_file(&self, name: &str, content: &str) -> Result<Box<dyn FileHandle>, StorageError>;
}

/// Entry point to a storage backend.
pub trait StorageProvider {
    fn list_repositories(&self) -> Result<Vec<Box<dyn Repository>>, StorageError>;
}

/// Reads and validates the diagram document stored in a file.
///
/// # Errors
///
/// Fails on backend errors or when the stored content does not validate as
/// a diagram document. The caller's working set is never touched.
pub fn read_model(file: &dyn FileHandle) -> Result<DiagramModel, PantographError> {
    let raw = file.read()?;
    Ok(DiagramModel::from_json(&raw)?)
}

/// Serializes a diagram document into a file.
pub fn write_model(file: &dyn FileHandle, model: &DiagramModel) -> Result<(), PantographError> {
    let json = model.to_json()?;
    file.write(&json)?;
    Ok(())
}

type FileMap = BTreeMap<String, String>;
type RepoMap = BTreeMap<String, FileMap>;

/// In-memory storage backend.
///
/// Handles share the store through `Rc<RefCell<..>>`, matching the
/// single-threaded editor model. Cloning the provider clones the handle,
/// not the data.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    repos: Rc<RefCell<RepoMap>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty repository, returning it. An existing repository
    /// of the same name is kept as-is.
    pub fn create_repository(&self, name: &str) -> MemoryRepository {
        self.repos
            .borrow_mut()
            .entry(name.to_string())
            .or_default();
        info!(repository = name; "Created repository");
        MemoryRepository {
            repos: Rc::clone(&self.repos),
            name: name.to_string(),
        }
    }
}

impl StorageProvider for MemoryProvider {
    fn list_repositories(&self) -> Result<Vec<Box<dyn Repository>>, StorageError> {
        Ok(self
            .repos
            .borrow()
            .keys()
            .map(|name| {
                Box::new(MemoryRepository {
                    repos: Rc::clone(&self.repos),
                    name: name.clone(),
                }) as Box<dyn Repository>
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryRepository {
    repos: Rc<RefCell<RepoMap>>,
    name: String,
}

impl MemoryRepository {
    fn with_files<T>(
        &self,
        f: impl FnOnce(&mut FileMap) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut repos = self.repos.borrow_mut();
        let files = repos
            .get_mut(&self.name)
            .ok_or_else(|| StorageError::RepositoryNotFound(self.name.clone()))?;
        f(files)
    }
}

impl Repository for MemoryRepository {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn list_files(&self) -> Result<Vec<Box<dyn FileHandle>>, StorageError> {
        self.with_files(|files| {
            Ok(files
                .keys()
                .map(|file| {
                    Box::new(MemoryFile {
                        repos: Rc::clone(&self.repos),
                        repo: self.name.clone(),
                        name: file.clone(),
                    }) as Box<dyn FileHandle>
                })
                .collect())
        })
    }

    fn create_file(&self, name: &str, content: &str) -> Result<Box<dyn FileHandle>, StorageError> {
        self.with_files(|files| {
            if files.contains_key(name) {
                return Err(StorageError::FileExists(name.to_string()));
            }
            files.insert(name.to_string(), content.to_string());
            debug!(repository = self.name.as_str(), file = name; "Created file");
            Ok(Box::new(MemoryFile {
                repos: Rc::clone(&self.repos),
                repo: self.name.clone(),
                name: name.to_string(),
            }) as Box<dyn FileHandle>)
        })
    }
}

#[derive(Debug, Clone)]
pub struct MemoryFile {
    repos: Rc<RefCell<RepoMap>>,
    repo: String,
    name: String,
}

impl FileHandle for MemoryFile {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn read(&self) -> Result<String, StorageError> {
        self.repos
            .borrow()
            .get(&self.repo)
            .ok_or_else(|| StorageError::RepositoryNotFound(self.repo.clone()))?
            .get(&self.name)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(self.name.clone()))
    }

    fn write(&self, content: &str) -> Result<(), StorageError> {
        let mut repos = self.repos.borrow_mut();
        let files = repos
            .get_mut(&self.repo)
            .ok_or_else(|| StorageError::RepositoryNotFound(self.repo.clone()))?;
        let slot = files
            .get_mut(&self.name)
            .ok_or_else(|| StorageError::FileNotFound(self.name.clone()))?;
        *slot = content.to_string();
        debug!(repository = self.repo.as_str(), file = self.name.as_str(); "Wrote file");
        Ok(())
    }

    fn delete(&self) -> Result<(), StorageError> {
        let mut repos = self.repos.borrow_mut();
        let files = repos
            .get_mut(&self.repo)
            .ok_or_else(|| StorageError::RepositoryNotFound(self.repo.clone()))?;
        files
            .remove(&self.name)
            .ok_or_else(|| StorageError::FileNotFound(self.name.clone()))?;
        debug!(repository = self.repo.as_str(), file = self.name.as_str(); "Deleted file");
        Ok(())
    }
}
