//! Session resolution and units of work.
//!
//! Every entity manager operation asks the [`SessionProvider`] for a
//! session. Inside a unit of work the caller passes the [`BoundSession`]
//! explicitly and the same session is reused; otherwise a session is opened
//! for that one operation and closed when its [`SessionHandle`] drops, on
//! success and on failure alike.
//!
//! ```ignore
//! let uow = provider.begin().await?;
//! let manager = manager.within(&uow);
//! manager.persist(&mut person, &people).await?;
//! uow.commit().await?;
//! ```

use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::Mutex;
use ulid::Ulid;

use crate::error::Result;
use crate::graph::{Session, SessionFactory};
use crate::proxy::DedupCache;

/// Resolves sessions against one session source.
#[derive(Clone)]
pub struct SessionProvider {
    factory: Arc<dyn SessionFactory>,
}

impl SessionProvider {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }

    /// Identifier of the underlying data source.
    pub fn source(&self) -> &str {
        self.factory.source()
    }

    /// The session bound to `bound` when it belongs to this source, else a
    /// fresh session scoped to the returned handle.
    pub async fn current_session(&self, bound: Option<&BoundSession>) -> Result<SessionHandle> {
        if let Some(bound) = bound {
            if bound.source.as_ref() == self.source() {
                return Ok(SessionHandle {
                    session: bound.session.clone(),
                    scoped: false,
                });
            }
            tracing::warn!(
                unit = %bound.unit,
                bound = %bound.source,
                source = %self.source(),
                "Bound session belongs to another source, opening a scoped session"
            );
        }

        let session = self.factory.open().await?;
        tracing::trace!(session = %session.id(), "Opened scoped session");
        Ok(SessionHandle {
            session,
            scoped: true,
        })
    }

    /// Starts a unit of work on a new transactional session.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let session = self.factory.open().await?;
        if let Err(e) = session.begin().await {
            session.close();
            return Err(e.into());
        }

        let unit = UnitOfWork {
            id: Ulid::new(),
            source: Arc::from(self.source()),
            session,
            navigated: Arc::new(Mutex::new(DedupCache::new())),
        };
        tracing::info!(unit = %unit.id, source = %unit.source, "Began unit of work");
        Ok(unit)
    }

    /// Runs `work` inside a unit of work, committing on success and rolling
    /// back on failure.
    pub async fn transaction<F, Fut, R>(&self, work: F) -> Result<R>
    where
        F: FnOnce(BoundSession) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let unit = self.begin().await?;
        match work(unit.bind()).await {
            Ok(value) => {
                unit.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(unit = %unit.id, error = %e, "Unit of work failed");
                unit.rollback().await?;
                Err(e)
            }
        }
    }
}

impl fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionProvider")
            .field("source", &self.source())
            .finish()
    }
}

/// A resolved session. Scoped sessions close when the handle drops; bound
/// sessions are left open for their unit of work.
pub struct SessionHandle {
    session: Arc<dyn Session>,
    scoped: bool,
}

impl SessionHandle {
    /// True when this handle owns the session.
    pub fn is_scoped(&self) -> bool {
        self.scoped
    }
}

impl Deref for SessionHandle {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.scoped {
            tracing::trace!(session = %self.session.id(), "Closing scoped session");
            self.session.close();
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &self.session.id())
            .field("scoped", &self.scoped)
            .finish()
    }
}

/// A transaction on one session, shared by every call bound to it.
///
/// Finish it with [`commit`](UnitOfWork::commit) or
/// [`rollback`](UnitOfWork::rollback). Dropping an unfinished unit closes
/// its session, discarding pending changes.
///
/// Proxies reached by navigation inside the unit are deduplicated for its
/// whole lifetime, so following the same reference twice yields the same
/// instance.
pub struct UnitOfWork {
    id: Ulid,
    source: Arc<str>,
    session: Arc<dyn Session>,
    navigated: Arc<Mutex<DedupCache>>,
}

impl UnitOfWork {
    pub fn id(&self) -> Ulid {
        self.id
    }

    /// Handle for passing this unit's session to entity manager calls.
    pub fn bind(&self) -> BoundSession {
        BoundSession {
            source: self.source.clone(),
            session: self.session.clone(),
            unit: self.id,
            navigated: self.navigated.clone(),
        }
    }

    pub async fn commit(self) -> Result<()> {
        self.session.commit().await?;
        tracing::info!(unit = %self.id, "Committed unit of work");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.session.rollback().await?;
        tracing::info!(unit = %self.id, "Rolled back unit of work");
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.session.close();
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("source", &self.source)
            .finish()
    }
}

/// The session of a unit of work, as passed to entity manager calls.
#[derive(Clone)]
pub struct BoundSession {
    source: Arc<str>,
    session: Arc<dyn Session>,
    unit: Ulid,
    navigated: Arc<Mutex<DedupCache>>,
}

impl BoundSession {
    /// Dedup scope shared by navigation calls inside the unit.
    pub(crate) fn navigated(&self) -> &Mutex<DedupCache> {
        &self.navigated
    }

    pub fn unit_id(&self) -> Ulid {
        self.unit
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for BoundSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundSession")
            .field("unit", &self.unit)
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OgmError, StorageError};
    use crate::graph::backends::memory::MemoryDatabase;
    use crate::graph::{Element, ElementKind, Record};

    fn provider(name: &str) -> SessionProvider {
        SessionProvider::new(Arc::new(MemoryDatabase::new(name)))
    }

    fn vertex() -> Element {
        Element::new(Record::new("Person", ElementKind::Vertex))
    }

    #[tokio::test]
    async fn test_scoped_session_closes_on_drop() {
        let provider = provider("scoped");
        let handle = provider.current_session(None).await.unwrap();
        assert!(handle.is_scoped());

        let session = handle.session.clone();
        assert!(!session.is_closed());
        drop(handle);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_bound_session_is_reused_and_left_open() {
        let provider = provider("bound");
        let unit = provider.begin().await.unwrap();
        let bound = unit.bind();

        let first = provider.current_session(Some(&bound)).await.unwrap();
        let second = provider.current_session(Some(&bound)).await.unwrap();
        assert!(!first.is_scoped());
        assert_eq!(first.id(), second.id());

        drop(first);
        assert!(!second.is_closed());
        unit.commit().await.unwrap();
        assert!(second.is_closed());
    }

    #[tokio::test]
    async fn test_foreign_bound_session_falls_back_to_scoped() {
        let provider = provider("mine");
        let other = self::provider("theirs");
        let unit = other.begin().await.unwrap();

        let handle = provider.current_session(Some(&unit.bind())).await.unwrap();
        assert!(handle.is_scoped());
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let provider = provider("commit");
        let unit = provider.begin().await.unwrap();
        let bound = unit.bind();

        let rid = {
            let session = provider.current_session(Some(&bound)).await.unwrap();
            session.save(&vertex(), None).await.unwrap()
        };
        let outside = provider.current_session(None).await.unwrap();
        assert!(outside.load(&rid).await.unwrap().is_none());

        unit.commit().await.unwrap();
        assert!(outside.load(&rid).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropped_unit_discards_changes() {
        let provider = provider("drop");
        let unit = provider.begin().await.unwrap();
        let rid = unit.bind().session.save(&vertex(), None).await.unwrap();
        drop(unit);

        let session = provider.current_session(None).await.unwrap();
        assert!(session.load(&rid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transaction_commits_or_rolls_back() {
        let provider = provider("tx");

        let rid = provider
            .transaction(|bound| async move {
                Ok::<_, OgmError>(bound.session.save(&vertex(), None).await?)
            })
            .await
            .unwrap();

        let failed: Result<()> = provider
            .transaction(|bound| async move {
                bound.session.save(&vertex(), None).await?;
                Err::<(), _>(OgmError::mapping("boom"))
            })
            .await;
        assert!(matches!(failed, Err(OgmError::Mapping(_))));

        let session = provider.current_session(None).await.unwrap();
        assert!(session.load(&rid).await.unwrap().is_some());
        assert_eq!(session.count_class("Person").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bindings_share_the_navigation_scope() {
        let provider = provider("navigated");
        let unit = provider.begin().await.unwrap();
        let (first, second) = (unit.bind(), unit.bind());
        assert!(std::ptr::eq(first.navigated(), second.navigated()));

        let other = provider.begin().await.unwrap();
        assert!(!std::ptr::eq(first.navigated(), other.bind().navigated()));
    }

    #[tokio::test]
    async fn test_finished_unit_session_is_closed() {
        let provider = provider("closed");
        let unit = provider.begin().await.unwrap();
        let bound = unit.bind();
        unit.rollback().await.unwrap();

        let session = provider.current_session(Some(&bound)).await.unwrap();
        let err = session.save(&vertex(), None).await.unwrap_err();
        assert_eq!(err, StorageError::SessionClosed);
    }
}
