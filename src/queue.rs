// Queue operations used by the shell. The actual service calls sit behind
// `QueueService` so the shell does not care how messages reach the queue.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Number of messages requested when viewing a queue.
pub const RECEIVE_BATCH: u32 = 10;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("invalid storage endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("invalid queue name '{0}': use 3-63 lowercase letters, digits or single dashes")]
    InvalidQueueName(String),
    #[error("request to the queue service failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("queue service returned {status}: {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },
    #[error("unexpected response from the queue service: {0}")]
    Response(String),
}

/// A message as returned by the service. `content` is the stored text,
/// still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub content: String,
    pub dequeue_count: Option<u32>,
}

impl QueueMessage {
    /// The content decoded back to text, when it is base64 of UTF-8.
    pub fn decoded(&self) -> Option<String> {
        decode_message(&self.content)
    }
}

/// Client for a queue service reachable through an account endpoint.
pub trait QueueService {
    /// Put `payload` on `queue`. The payload is sent as given.
    fn enqueue(&self, endpoint: &str, queue: &str, payload: &str) -> Result<(), QueueError>;

    /// Fetch up to `max` messages from `queue`.
    fn receive(
        &self,
        endpoint: &str,
        queue: &str,
        max: u32,
    ) -> Result<Vec<QueueMessage>, QueueError>;
}

impl<T: QueueService + ?Sized> QueueService for &T {
    fn enqueue(&self, endpoint: &str, queue: &str, payload: &str) -> Result<(), QueueError> {
        (**self).enqueue(endpoint, queue, payload)
    }

    fn receive(
        &self,
        endpoint: &str,
        queue: &str,
        max: u32,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        (**self).receive(endpoint, queue, max)
    }
}

/// Standard padded base64 over the UTF-8 bytes of `message`.
pub fn encode_message(message: &str) -> String {
    STANDARD.encode(message.as_bytes())
}

pub fn decode_message(content: &str) -> Option<String> {
    let bytes = STANDARD.decode(content.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Encode `message` and enqueue it.
pub fn send<Q: QueueService + ?Sized>(
    service: &Q,
    endpoint: &str,
    queue: &str,
    message: &str,
) -> Result<(), QueueError> {
    service.enqueue(endpoint, queue, &encode_message(message))
}

/// Fetch one batch of messages. An empty queue is an empty vector.
pub fn view<Q: QueueService + ?Sized>(
    service: &Q,
    endpoint: &str,
    queue: &str,
) -> Result<Vec<QueueMessage>, QueueError> {
    service.receive(endpoint, queue, RECEIVE_BATCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        enqueued: RefCell<Vec<(String, String, String)>>,
        requested: RefCell<Vec<u32>>,
    }

    impl QueueService for Recorder {
        fn enqueue(&self, endpoint: &str, queue: &str, payload: &str) -> Result<(), QueueError> {
            self.enqueued
                .borrow_mut()
                .push((endpoint.into(), queue.into(), payload.into()));
            Ok(())
        }

        fn receive(&self, _: &str, _: &str, max: u32) -> Result<Vec<QueueMessage>, QueueError> {
            self.requested.borrow_mut().push(max);
            Ok(Vec::new())
        }
    }

    #[test]
    fn send_delivers_base64_payload() {
        let recorder = Recorder::default();
        send(&recorder, "ep", "orders", "hello").unwrap();
        assert_eq!(
            recorder.enqueued.borrow().as_slice(),
            [("ep".to_string(), "orders".to_string(), "aGVsbG8=".to_string())]
        );
    }

    #[test]
    fn encoding_is_over_utf8_bytes() {
        assert_eq!(encode_message(""), "");
        assert_eq!(encode_message("olá"), "b2zDoQ==");
    }

    #[test]
    fn view_requests_a_single_batch_of_ten() {
        let recorder = Recorder::default();
        assert!(view(&recorder, "ep", "orders").unwrap().is_empty());
        assert_eq!(recorder.requested.borrow().as_slice(), [10]);
    }

    #[test]
    fn transport_errors_keep_their_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = QueueError::Transport(Box::new(cause));
        assert_eq!(
            err.to_string(),
            "request to the queue service failed: connection refused"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn decoded_preview_only_for_text_payloads() {
        let msg = |content: &str| QueueMessage {
            id: "1".into(),
            content: content.into(),
            dequeue_count: None,
        };
        assert_eq!(msg("aGVsbG8=").decoded().as_deref(), Some("hello"));
        assert_eq!(msg("not base64!").decoded(), None);
        assert_eq!(msg("/w==").decoded(), None);
    }
}
