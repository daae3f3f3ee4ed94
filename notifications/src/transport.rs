use crate::error::Error;
use crate::message::{Notification, Page};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio::task::JoinHandle;

/// Server-push notifications for one user. Ends on the first error.
pub type NotificationStream = BoxStream<'static, Result<Notification, Error>>;

/// The backend notification API as the manager sees it.
///
/// Implementations report the terminal disable signal as
/// [`ErrorKind::Unavailable`](crate::error::ErrorKind::Unavailable); every other
/// error is treated as transient.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn unread_count(&self, user_id: &str) -> Result<i64, Error>;

    async fn list(&self, user_id: &str, page: u32, size: u32) -> Result<Page, Error>;

    async fn mark_read(&self, notification_id: &str) -> Result<(), Error>;

    /// Sets up the push stream without waiting for the server.
    ///
    /// An `Err` here means the stream could not even be constructed. Handshake
    /// and delivery failures arrive later as items of the returned stream.
    fn open_stream(&self, user_id: &str) -> Result<NotificationStream, Error>;
}

/// Owned handle to a spawned transport task (stream reader or poll timer).
///
/// Dropping the handle aborts the task, so releasing a transport is the same
/// operation whichever kind it is.
#[derive(Debug)]
pub struct TaskHandle {
    inner: JoinHandle<()>,
}

impl TaskHandle {
    pub fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: tokio::spawn(future),
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.inner.abort();
    }
}
