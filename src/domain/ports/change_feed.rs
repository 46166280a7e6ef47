use futures::stream::BoxStream;

use crate::domain::models::{ChangeEvent, ChangeFilter};

/// Push-based change notifications from the document store.
///
/// Consumers that fall behind may miss events; every consumer must treat the
/// stream as a hint and re-read documents before acting on them.
pub trait ChangeFeed: Send + Sync {
    /// Subscribe to committed changes matching `filter`.
    fn subscribe(&self, filter: ChangeFilter) -> BoxStream<'static, ChangeEvent>;
}
