use crate::models::Post;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 64;

/// In-process change feed for newly inserted posts.
#[derive(Debug, Clone)]
pub struct PostEvents {
    sender: broadcast::Sender<Post>,
}

impl Default for PostEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, post: Post) {
        // No open sessions is not an error.
        match self.sender.send(post) {
            Ok(receivers) => trace!(receivers, "Published new post"),
            Err(_) => trace!("Published new post with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Post> {
        self.sender.subscribe()
    }
}
