//! Kernel code-hash handshake
//!
//! The compiler publishes a kernel's identity hash once compilation is done.
//! Cache operations wait for it before touching any record: the hash
//! captures the kernel source and its dependencies, so records written
//! against an older build are never matched.

use tokio::sync::watch;

use super::HashError;

/// Compiler-side half of the handshake. Publishing consumes it, so a hash
/// is published at most once.
#[derive(Debug)]
pub struct CodeHashPublisher {
    tx: watch::Sender<Option<String>>,
}

impl CodeHashPublisher {
    /// Publish the identity hash, waking every waiter.
    pub fn publish(self, hash: impl Into<String>) {
        self.tx.send_replace(Some(hash.into()));
    }
}

/// Cache-side half of the handshake. Cheap to clone; every clone observes
/// the same published hash.
#[derive(Debug, Clone)]
pub struct CodeHashReceiver {
    rx: watch::Receiver<Option<String>>,
}

impl CodeHashReceiver {
    /// The hash, if it has been published already.
    pub fn try_get(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Wait until the hash is published.
    ///
    /// Fails with [`HashError::CompilerGone`] if the publisher is dropped
    /// first. Dropping the returned future cancels the wait.
    pub async fn wait(&mut self, kernel: &str) -> Result<String, HashError> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(hash) => Ok(hash.clone().unwrap_or_default()),
            Err(_) => Err(HashError::CompilerGone(kernel.to_string())),
        }
    }
}

/// Create a linked publisher/receiver pair.
pub fn code_hash_channel() -> (CodeHashPublisher, CodeHashReceiver) {
    let (tx, rx) = watch::channel(None);
    (CodeHashPublisher { tx }, CodeHashReceiver { rx })
}

/// A compiled kernel, as seen by the cache.
pub trait Kernel: Send + Sync {
    /// Kernel name; becomes the first segment of every record path.
    fn name(&self) -> &str;

    /// Free-text signature stored in new records.
    fn signature(&self) -> String;

    /// Trigger compilation if it hasn't been triggered yet and return a
    /// receiver for the resulting code hash.
    fn compile(&self) -> CodeHashReceiver;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_published_before_wait() {
        let (publisher, mut receiver) = code_hash_channel();
        publisher.publish("abc123");

        assert_eq!(receiver.try_get().as_deref(), Some("abc123"));
        assert_eq!(receiver.wait("k").await.unwrap(), "abc123");
    }

    #[tokio::test]
    async fn test_published_while_waiting() {
        let (publisher, mut receiver) = code_hash_channel();
        assert!(receiver.try_get().is_none());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish("late");
        });

        assert_eq!(receiver.wait("k").await.unwrap(), "late");
    }

    #[tokio::test]
    async fn test_clones_see_same_hash() {
        let (publisher, receiver) = code_hash_channel();
        let mut a = receiver.clone();
        let mut b = receiver;
        publisher.publish("shared");

        assert_eq!(a.wait("k").await.unwrap(), "shared");
        assert_eq!(b.wait("k").await.unwrap(), "shared");
    }

    #[tokio::test]
    async fn test_dropped_publisher() {
        let (publisher, mut receiver) = code_hash_channel();
        drop(publisher);

        let err = receiver.wait("matmul").await.unwrap_err();
        assert!(matches!(err, HashError::CompilerGone(name) if name == "matmul"));
    }
}
