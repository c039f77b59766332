use crossbeam_channel::{bounded, Receiver, SendError, Sender};

pub fn spsc_channel<T>(capacity: usize) -> (SpscSender<T>, SpscReceiver<T>) {
    let (tx, rx) = bounded(capacity);
    (SpscSender { inner: tx }, SpscReceiver { inner: rx })
}

/// Single-producer handle; deliberately not `Clone`.
pub struct SpscSender<T> {
    inner: Sender<T>,
}

impl<T> SpscSender<T> {
    /// Blocks while the channel is full. Fails once the receiver is dropped,
    /// which is how a replay learns its consumer stopped early.
    #[inline]
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        self.inner.send(value)
    }
}

pub struct SpscReceiver<T> {
    inner: Receiver<T>,
}

impl<T> SpscReceiver<T> {
    /// Yields until the sender is dropped and the channel drained.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.inner.iter()
    }
}
