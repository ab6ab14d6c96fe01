//! Generic CRUD repository.
//!
//! Derived repositories delegate to a [`Repository`] bound to one entity
//! type, so each declared method is a one-line call into the entity manager.

use std::fmt;

use crate::error::Result;
use crate::manager::EntityManager;
use crate::mapping::{Entity, EntityId, EntityInformation};
use crate::proxy::{EntityProxy, Persistable};
use crate::session::UnitOfWork;

/// CRUD and query operations for entities of type `T` keyed by `ID`.
pub struct Repository<T, ID> {
    manager: EntityManager,
    information: EntityInformation<T, ID>,
}

impl<T, ID> Clone for Repository<T, ID> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            information: self.information.clone(),
        }
    }
}

impl<T, ID> fmt::Debug for Repository<T, ID> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("information", &self.information)
            .finish()
    }
}

impl<T: Entity, ID: EntityId> Repository<T, ID> {
    pub fn new(manager: EntityManager, information: EntityInformation<T, ID>) -> Self {
        Self {
            manager,
            information,
        }
    }

    pub fn information(&self) -> &EntityInformation<T, ID> {
        &self.information
    }

    pub fn manager(&self) -> &EntityManager {
        &self.manager
    }

    /// This repository with every call running inside `unit`.
    pub fn within(&self, unit: &UnitOfWork) -> Self {
        Self {
            manager: self.manager.within(unit),
            information: self.information.clone(),
        }
    }

    /// Inserts a new entity.
    pub async fn save(&self, entity: T) -> Result<EntityProxy<T>> {
        self.manager
            .persist_in(Persistable::transient(entity), None, &self.information)
            .await
    }

    pub async fn save_in_cluster(&self, entity: T, cluster: &str) -> Result<EntityProxy<T>> {
        self.manager
            .persist_in(Persistable::transient(entity), Some(cluster), &self.information)
            .await
    }

    /// Writes a managed entity's changes back.
    pub async fn update(&self, entity: &EntityProxy<T>) -> Result<EntityProxy<T>> {
        self.manager
            .persist_in(entity.clone(), None, &self.information)
            .await
    }

    pub async fn find_by_id(&self, id: &ID) -> Result<Option<EntityProxy<T>>> {
        self.manager.find(id, &self.information).await
    }

    pub async fn exists_by_id(&self, id: &ID) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    pub async fn find_all(&self) -> Result<Vec<EntityProxy<T>>> {
        self.manager.find_all(&self.information).await
    }

    pub async fn find_all_in_cluster(&self, cluster: &str) -> Result<Vec<EntityProxy<T>>> {
        self.manager
            .find_all_in_cluster(cluster, &self.information)
            .await
    }

    pub async fn count(&self) -> Result<u64> {
        self.manager.count(&self.information).await
    }

    pub async fn delete(&self, entity: &EntityProxy<T>) -> Result<()> {
        self.manager.remove(entity.clone()).await
    }

    /// Deletes the entity stored under `id`. Returns whether one existed.
    pub async fn delete_by_id(&self, id: &ID) -> Result<bool> {
        match self.find_by_id(id).await? {
            Some(entity) => {
                self.delete(&entity).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Runs a query template, `%s` standing for the class name.
    pub async fn query(&self, template: &str) -> Result<Vec<EntityProxy<T>>> {
        self.manager
            .create_query(template, &self.information)
            .await?
            .get_result_list()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::graph::backends::memory::MemoryDatabase;
    use crate::graph::Rid;
    use crate::mapping::{EntityMarker, EntityRegistry, FieldSpec, RidIdParser};
    use crate::session::SessionProvider;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book {
        id: Option<Rid>,
        title: String,
        pages: u32,
    }

    impl Entity for Book {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::vertex()]
        }

        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::id("id")]
        }
    }

    fn books() -> Repository<Book, Rid> {
        let registry = Arc::new(EntityRegistry::builder().register::<Book>().build().unwrap());
        let sessions = SessionProvider::new(Arc::new(MemoryDatabase::new("books")));
        Repository::new(
            EntityManager::new(sessions),
            EntityInformation::new(registry, RidIdParser).unwrap(),
        )
    }

    fn book(title: &str, pages: u32) -> Book {
        Book {
            id: None,
            title: title.to_string(),
            pages,
        }
    }

    #[tokio::test]
    async fn test_save_find_update_delete() {
        let books = books();
        let saved = books.save(book("Dune", 412)).await.unwrap();
        let id = saved.rid().unwrap();
        assert!(books.exists_by_id(&id).await.unwrap());

        let found = books.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.entity().unwrap(), Book { id: Some(id), ..book("Dune", 412) });

        found.set("pages", 500).unwrap();
        books.update(&found).await.unwrap();
        let reloaded = books.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(reloaded.get::<u32>("pages").unwrap(), 500);

        assert!(books.delete_by_id(&id).await.unwrap());
        assert!(!books.delete_by_id(&id).await.unwrap());
        assert!(!books.exists_by_id(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_update_is_a_storage_error() {
        let books = books();
        let saved = books.save(book("Dune", 412)).await.unwrap();
        let id = saved.rid().unwrap();

        let first = books.find_by_id(&id).await.unwrap().unwrap();
        let second = books.find_by_id(&id).await.unwrap().unwrap();
        first.set("pages", 1).unwrap();
        second.set("pages", 2).unwrap();

        books.update(&first).await.unwrap();
        let err = books.update(&second).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::OgmError::Storage(crate::error::StorageError::ConcurrentModification { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_and_count() {
        let books = books();
        for (title, pages) in [("Dune", 412), ("Emma", 474), ("Ubik", 202)] {
            books.save(book(title, pages)).await.unwrap();
        }

        let long = books
            .query("select from %s where pages > 400 order by title desc")
            .await
            .unwrap();
        let titles: Vec<String> = long.iter().map(|b| b.get("title").unwrap()).collect();
        assert_eq!(titles, vec!["Emma", "Dune"]);
        assert_eq!(books.count().await.unwrap(), 3);
        assert_eq!(books.find_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_save_in_cluster() {
        let books = books();
        books.save_in_cluster(book("Dune", 412), "archive").await.unwrap();
        books.save(book("Emma", 474)).await.unwrap();

        let archived = books.find_all_in_cluster("archive").await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].get::<String>("title").unwrap(), "Dune");
    }
}
