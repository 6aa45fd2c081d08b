use std::sync::mpsc;
use std::time::Duration;

pub const ACTION_RESULT_POLL_INTERVAL: Duration = Duration::from_millis(24);

pub(super) enum WorkerPoll<T> {
    Pending,
    Done(T),
    Disconnected,
}

/// Handle to work running on a background thread. Dropping it abandons the result.
pub(super) struct WorkerJob<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> WorkerJob<T> {
    pub(super) fn poll(&self) -> WorkerPoll<T> {
        match self.rx.try_recv() {
            Ok(result) => WorkerPoll::Done(result),
            Err(mpsc::TryRecvError::Empty) => WorkerPoll::Pending,
            Err(mpsc::TryRecvError::Disconnected) => WorkerPoll::Disconnected,
        }
    }
}

pub(super) fn spawn_worker_action<T, W>(work: W) -> WorkerJob<T>
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<T>();
    std::thread::spawn(move || {
        let result = work();
        let _ = tx.send(result);
    });
    WorkerJob { rx }
}
