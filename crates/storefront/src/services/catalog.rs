//! Catalog administration: explicit cascading deletes.
//!
//! Deleting a category deletes each of its items first, one at a time
//! through [`CatalogAdmin::delete_item`], and only then the category row.
//! Deleting an item removes its image from the media store afterwards.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use greenbasket_core::catalog::Item;
use greenbasket_core::types::{CategoryId, ItemId};

use crate::db::{CatalogStore, RepositoryError};

/// Errors from catalog administration.
#[derive(Debug, Error)]
pub enum CatalogAdminError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An item delete failed partway through a category delete. The
    /// category row is still present.
    #[error("category {category_id} not deleted: {deleted} item(s) removed before failure: {source}")]
    Partial {
        category_id: CategoryId,
        deleted: usize,
        #[source]
        source: Box<CatalogAdminError>,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of a category delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDeletion {
    pub category_id: CategoryId,
    pub deleted_items: Vec<ItemId>,
}

/// Where item images live.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Remove the object stored under `key`. A missing object is not an error.
    async fn remove(&self, key: &str) -> io::Result<()>;
}

/// Images stored as files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map an image key such as `/media/items/apple.jpg` to a path under the
    /// root. Keys that could escape the root are rejected.
    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let relative = key.trim_start_matches('/');
        let relative = relative.strip_prefix("media/").unwrap_or(relative);
        let relative = Path::new(relative);

        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn remove(&self, key: &str) -> io::Result<()> {
        let path = self.resolve(key).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("unsafe media key: {key}"))
        })?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Media file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Catalog delete use-cases.
#[derive(Clone)]
pub struct CatalogAdmin {
    catalog: Arc<dyn CatalogStore>,
    media: Arc<dyn MediaStore>,
}

impl CatalogAdmin {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { catalog, media }
    }

    /// Delete an item, then its image.
    ///
    /// # Errors
    ///
    /// `NotFound` if the item does not exist, `Repository` if the delete
    /// fails. Image removal failures are logged only.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn delete_item(&self, id: ItemId) -> Result<Item, CatalogAdminError> {
        let item = self
            .catalog
            .delete_item(id)
            .await?
            .ok_or(CatalogAdminError::NotFound("item"))?;

        if let Some(image) = item.image.as_deref().filter(|image| !image.is_empty()) {
            if let Err(e) = self.media.remove(image).await {
                warn!(image, error = %e, "Failed to remove item image");
            }
        }

        info!(name = %item.name, "Item deleted");
        Ok(item)
    }

    /// Delete every item of a category, then the category.
    ///
    /// # Errors
    ///
    /// `NotFound` if the category does not exist. The first failing item
    /// stops the operation with `Partial`, leaving the category in place.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<CategoryDeletion, CatalogAdminError> {
        if !self.catalog.category_exists(id).await? {
            return Err(CatalogAdminError::NotFound("category"));
        }

        let items = self.catalog.items_in_category(id).await?;
        let mut deleted_items = Vec::with_capacity(items.len());

        for item in items {
            match self.delete_item(item.id).await {
                Ok(_) => deleted_items.push(item.id),
                Err(e) => {
                    warn!(item_id = %item.id, deleted = deleted_items.len(), error = %e, "Category delete aborted");
                    return Err(CatalogAdminError::Partial {
                        category_id: id,
                        deleted: deleted_items.len(),
                        source: Box::new(e),
                    });
                }
            }
        }

        if !self.catalog.delete_category(id).await? {
            return Err(CatalogAdminError::NotFound("category"));
        }

        info!(items = deleted_items.len(), "Category deleted");
        Ok(CategoryDeletion {
            category_id: id,
            deleted_items,
        })
    }
}
