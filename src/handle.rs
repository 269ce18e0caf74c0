use super::{
    errors::SpawnError,
    result::SpawnResult,
};
use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;


/// Handle на задачу с поддержкой отмены и timeout
pub struct JoinHandle<T> {
    cancel_token: CancellationToken,
    receiver: oneshot::Receiver<SpawnResult<T>>,
}

impl<T> JoinHandle<T> {

    pub(crate) fn new
    (
        cancel_token: CancellationToken,
        receiver: oneshot::Receiver<SpawnResult<T>>,
    ) -> Self {
        Self {
            cancel_token,
            receiver
        }
    }

    /// Отмена действует только пока задача ждёт в очереди
    #[inline]
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Блокирующее ожидание результата.
    ///
    /// Нельзя вызывать внутри async-рантайма: используйте `.await`.
    pub fn join(self) -> SpawnResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(SpawnError::ChannelClosed))
    }

    pub async fn await_timeout(self, timeout: Duration) -> SpawnResult<T> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SpawnError::ChannelClosed),
            Err(_) => Err(SpawnError::Timeout),
        }
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = SpawnResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.receiver.poll_unpin(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(SpawnError::ChannelClosed))),
            Poll::Pending => Poll::Pending,
        }
    }
}


/// Оборачивает замыкание в задачу, которая отправляет результат в handle.
///
/// Паника пробрасывается дальше после отправки результата, чтобы воркер учёл её как сбой.
pub(crate) fn with_handle<T, F>(f: F) -> (impl FnOnce() + Send + 'static, JoinHandle<T>)
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel::<SpawnResult<T>>();
    let cancel_token = CancellationToken::new();
    let ct = cancel_token.clone();

    let job = move || {
        if ct.is_cancelled() {
            let _ = tx.send(Err(SpawnError::Cancelled));
            return;
        }

        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                let _ = tx.send(Ok(value));
            }
            Err(payload) => {
                let _ = tx.send(Err(SpawnError::Panic(panic_message(payload.as_ref()))));
                panic::resume_unwind(payload);
            }
        }
    };

    (job, JoinHandle::new(cancel_token, rx))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in submitted task".to_string()
    }
}
