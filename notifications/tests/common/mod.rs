//! Scripted in-memory backend for driving `Manager` in tests.

use async_trait::async_trait;
use futures_util::stream;
use notifications::error::{http_error, stream_error, unavailable, HttpErrorKind, StreamErrorKind};
use notifications::transport::{NotificationApi, NotificationStream};
use notifications::{Error, Notification, Page};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// What the fake answers to one REST call.
#[derive(Clone)]
pub enum Reply {
    Count(i64),
    Unavailable,
    Transient,
    /// Waits for the gate to open, then answers with the count.
    Gated(Arc<Notify>, i64),
    /// Never answers.
    Hang,
}

/// What the fake does on one `open_stream` call.
pub enum StreamSetup {
    Open,
    SetupFails,
    SetupUnavailable,
}

pub type StreamItem = Result<Notification, Error>;

#[derive(Default)]
struct Script {
    unread: VecDeque<Reply>,
    mark_read: VecDeque<Reply>,
    pages: VecDeque<Result<Page, Reply>>,
    streams: VecDeque<StreamSetup>,
    stream_sender: Option<mpsc::UnboundedSender<StreamItem>>,
    marked: Vec<String>,
}

#[derive(Default)]
pub struct FakeApi {
    script: Mutex<Script>,
    pub open_stream_calls: AtomicUsize,
    pub unread_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub mark_read_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_stream(&self, setup: StreamSetup) {
        self.script.lock().unwrap().streams.push_back(setup);
    }

    pub fn script_unread(&self, reply: Reply) {
        self.script.lock().unwrap().unread.push_back(reply);
    }

    pub fn script_mark_read(&self, reply: Reply) {
        self.script.lock().unwrap().mark_read.push_back(reply);
    }

    pub fn script_page(&self, page: Result<Page, Reply>) {
        self.script.lock().unwrap().pages.push_back(page);
    }

    /// Pushes one event down the currently open stream.
    pub fn push(&self, item: StreamItem) {
        let script = self.script.lock().unwrap();
        let sender = script.stream_sender.as_ref().expect("no stream is open");
        let _ = sender.send(item);
    }

    pub fn push_notification(&self, id: &str, read: bool) {
        self.push(Ok(Notification::new(id, read)));
    }

    pub fn fail_stream_transient(&self) {
        self.push(Err(stream_error(StreamErrorKind::Interrupted, "connection reset")));
    }

    pub fn fail_stream_unavailable(&self) {
        self.push(Err(unavailable()));
    }

    /// Ends the open stream without an error.
    pub fn end_stream(&self) {
        self.script.lock().unwrap().stream_sender = None;
    }

    /// True while the manager still holds the receiving end of the stream.
    pub fn stream_is_held(&self) -> bool {
        self.script
            .lock()
            .unwrap()
            .stream_sender
            .as_ref()
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    pub fn marked(&self) -> Vec<String> {
        self.script.lock().unwrap().marked.clone()
    }

    async fn answer(reply: Reply) -> Result<i64, Error> {
        match reply {
            Reply::Count(count) => Ok(count),
            Reply::Unavailable => Err(unavailable()),
            Reply::Transient => Err(http_error(HttpErrorKind::Network, "connection refused")),
            Reply::Gated(gate, count) => {
                gate.notified().await;
                Ok(count)
            }
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Ok(0)
            }
        }
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn unread_count(&self, _user_id: &str) -> Result<i64, Error> {
        self.unread_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .script
            .lock()
            .unwrap()
            .unread
            .pop_front()
            .unwrap_or(Reply::Count(0));
        Self::answer(reply).await
    }

    async fn list(&self, _user_id: &str, _page: u32, _size: u32) -> Result<Page, Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pages.pop_front();
        match scripted {
            Some(Ok(page)) => Ok(page),
            Some(Err(reply)) => Self::answer(reply).await.map(|_| Page::default()),
            None => Ok(Page::default()),
        }
    }

    async fn mark_read(&self, notification_id: &str) -> Result<(), Error> {
        self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .script
            .lock()
            .unwrap()
            .mark_read
            .pop_front()
            .unwrap_or(Reply::Count(0));
        Self::answer(reply).await?;
        self.script
            .lock()
            .unwrap()
            .marked
            .push(notification_id.to_string());
        Ok(())
    }

    fn open_stream(&self, _user_id: &str) -> Result<NotificationStream, Error> {
        self.open_stream_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        match script.streams.pop_front().unwrap_or(StreamSetup::SetupFails) {
            StreamSetup::Open => {
                let (tx, rx) = mpsc::unbounded_channel();
                script.stream_sender = Some(tx);
                let stream = stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok(Box::pin(stream))
            }
            StreamSetup::SetupFails => Err(stream_error(
                StreamErrorKind::SetupFailed,
                "stream unsupported",
            )),
            StreamSetup::SetupUnavailable => Err(unavailable()),
        }
    }
}

/// Lets every runnable task finish its current step. Under a paused clock the
/// short sleep only fires once the runtime is otherwise idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Advances the paused clock by one poll interval and lets the tick run.
pub async fn tick(period: Duration) {
    tokio::time::advance(period).await;
    settle().await;
}
