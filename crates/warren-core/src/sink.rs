//! Delivery of text to a connected actor.

/// Somewhere text for one actor can be delivered.
///
/// Delivery is fire-and-forget: an actor whose connection has gone away
/// silently loses the text.
pub trait Sink: Send + Sync {
    /// Deliver one flushed message block.
    fn deliver(&self, text: &str);
}

impl Sink for crossbeam_channel::Sender<String> {
    fn deliver(&self, text: &str) {
        // A closed receiver means the connection is gone.
        let _ = self.send(text.to_owned());
    }
}
