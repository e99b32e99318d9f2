//! Test doubles shared by unit tests.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

use futures::future::{self, BoxFuture};

use crate::{
    services::messenger::{MessageHandle, Messenger, TransportError, TransportResult},
    state::{question::PresentedQuestion, session::ConversationId},
};

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Question {
        conversation_id: ConversationId,
        question: PresentedQuestion,
        handle: MessageHandle,
    },
    Edit {
        handle: MessageHandle,
        text: String,
    },
    Text {
        conversation_id: ConversationId,
        text: String,
    },
}

/// Messenger keeping every delivered message, with scripted failures.
#[derive(Clone, Default)]
pub struct RecordingMessenger {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    sent: Mutex<Vec<Sent>>,
    failures: AtomicUsize,
    fail_always: AtomicBool,
    calls: AtomicUsize,
    next_id: AtomicU64,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` calls.
    pub fn fail_next(&self, count: usize) {
        self.inner.failures.store(count, Ordering::SeqCst);
    }

    /// Fail every call until switched off.
    pub fn fail_always(&self, fail: bool) {
        self.inner.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn texts(&self, conversation_id: ConversationId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text {
                    conversation_id: id,
                    text,
                } if id == conversation_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn questions(&self, conversation_id: ConversationId) -> Vec<PresentedQuestion> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Question {
                    conversation_id: id,
                    question,
                    ..
                } if id == conversation_id => Some(question),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(MessageHandle, String)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Edit { handle, text } => Some((handle, text)),
                _ => None,
            })
            .collect()
    }

    /// Handle of the last question delivered to a conversation.
    pub fn last_question_handle(&self, conversation_id: ConversationId) -> Option<MessageHandle> {
        self.sent().into_iter().rev().find_map(|sent| match sent {
            Sent::Question {
                conversation_id: id,
                handle,
                ..
            } if id == conversation_id => Some(handle),
            _ => None,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sent>> {
        self.inner.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attempt(&self) -> TransportResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_always.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("scripted outage".into()));
        }
        let scripted = self
            .inner
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        match scripted {
            Ok(_) => Err(TransportError::Unavailable("scripted failure".into())),
            Err(_) => Ok(()),
        }
    }
}

impl Messenger for RecordingMessenger {
    fn send_question(
        &self,
        conversation_id: ConversationId,
        question: PresentedQuestion,
    ) -> BoxFuture<'static, TransportResult<MessageHandle>> {
        let result = self.attempt().map(|()| {
            let handle = MessageHandle::new(
                conversation_id,
                self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            );
            self.lock().push(Sent::Question {
                conversation_id,
                question,
                handle,
            });
            handle
        });
        Box::pin(future::ready(result))
    }

    fn edit_message(
        &self,
        handle: MessageHandle,
        text: String,
    ) -> BoxFuture<'static, TransportResult<()>> {
        let known = self.lock().iter().any(|sent| {
            matches!(sent, Sent::Question { handle: h, .. } if *h == handle)
        });
        let result = if known {
            self.attempt()
                .map(|()| self.lock().push(Sent::Edit { handle, text }))
        } else {
            self.inner.calls.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::UnknownMessage(handle))
        };
        Box::pin(future::ready(result))
    }

    fn send_text(
        &self,
        conversation_id: ConversationId,
        text: String,
    ) -> BoxFuture<'static, TransportResult<()>> {
        let result = self.attempt().map(|()| {
            self.lock().push(Sent::Text {
                conversation_id,
                text,
            })
        });
        Box::pin(future::ready(result))
    }
}
