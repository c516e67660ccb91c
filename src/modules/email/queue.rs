use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{EmailMessage, Mailer};

/// Handle for enqueueing best-effort email delivery
#[derive(Clone)]
pub struct EmailQueue {
    sender: mpsc::Sender<EmailMessage>,
}

impl EmailQueue {
    /// Spawn the delivery task. It ends once every `EmailQueue` clone is dropped.
    pub fn start(mailer: Arc<dyn Mailer>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<EmailMessage>(capacity.max(1));

        let handle = tokio::spawn(async move {
            tracing::info!("Email delivery worker started");
            while let Some(message) = receiver.recv().await {
                if let Err(e) = mailer.send(&message).await {
                    tracing::warn!(to = %message.to, "Email delivery failed: {}", e);
                }
            }
            tracing::info!("Email delivery worker stopped");
        });

        (Self { sender }, handle)
    }

    /// Returns false when the queue is full or closed; the message is dropped.
    pub fn enqueue(&self, message: EmailMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                tracing::warn!(to = %message.to, "Email queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                tracing::warn!(to = %message.to, "Email queue closed, dropping message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::email::EmailError;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            self.sent.lock().await.push(message.clone());
            if self.fail {
                return Err(EmailError::Build("boom".to_string()));
            }
            Ok(())
        }
    }

    fn message(n: usize) -> EmailMessage {
        EmailMessage {
            to: format!("user{}@example.com", n),
            subject: "Subject".to_string(),
            body: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_messages_are_delivered_in_order() {
        let mailer = Arc::new(RecordingMailer::default());
        let (queue, handle) = EmailQueue::start(mailer.clone(), 8);

        assert!(queue.enqueue(message(1)));
        assert!(queue.enqueue(message(2)));
        drop(queue);
        handle.await.unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "user1@example.com");
    }

    #[tokio::test]
    async fn test_delivery_failures_do_not_stop_worker() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let (queue, handle) = EmailQueue::start(mailer.clone(), 8);

        queue.enqueue(message(1));
        queue.enqueue(message(2));
        drop(queue);
        handle.await.unwrap();

        assert_eq!(mailer.sent.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_queue_rejects() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let queue = EmailQueue { sender };
        assert!(!queue.enqueue(message(1)));
    }
}
