use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use http::{Request, Response, StatusCode};
use http_body::Body;
use pin_project::pin_project;
use tokio::sync::{Notify, watch};
use tower::{Layer, Service};

/// Shutdown status shared by the HTTP layer and background tasks.
#[derive(Clone)]
pub struct ShutdownState {
    is_shutting_down: Arc<AtomicBool>,
    in_flight_count: Arc<AtomicUsize>,
    drained: Arc<Notify>,
    signal: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownState {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            is_shutting_down: Arc::new(AtomicBool::new(false)),
            in_flight_count: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
            signal: Arc::new(signal),
        }
    }

    /// Rejects new requests and tells background tasks to stop.
    pub fn start_shutdown(&self) {
        self.is_shutting_down.store(true, Ordering::SeqCst);
        self.signal.send_replace(true);
        self.drained.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight_count.load(Ordering::SeqCst)
    }

    /// Receiver that flips to `true` once shutdown starts.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.signal.subscribe()
    }

    /// Resolves once shutdown has started and every in-flight request finished.
    pub fn completed(&self) -> impl Future<Output = ()> + Send + 'static {
        let state = self.clone();
        async move {
            loop {
                let notified = state.drained.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if state.is_shutting_down() && state.in_flight_count() == 0 {
                    return;
                }
                notified.await;
            }
        }
    }

    fn enter(&self) -> InFlightGuard {
        self.in_flight_count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            state: self.clone(),
        }
    }
}

/// Counts one request as in flight until dropped, including when the
/// request future is cancelled by a timeout.
struct InFlightGuard {
    state: ShutdownState,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let previous = self.state.in_flight_count.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 && self.state.is_shutting_down() {
            self.state.drained.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct GracefulShutdownLayer {
    state: ShutdownState,
}

impl GracefulShutdownLayer {
    pub fn new(state: ShutdownState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for GracefulShutdownLayer {
    type Service = GracefulShutdownService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GracefulShutdownService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Answers 503 once shutdown started; otherwise forwards and tracks the request.
#[derive(Clone)]
pub struct GracefulShutdownService<S> {
    inner: S,
    state: ShutdownState,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for GracefulShutdownService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Body + Default,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = GracefulShutdownFuture<S::Future, ResBody, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if self.state.is_shutting_down() {
            let mut response = Response::new(ResBody::default());
            *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            return GracefulShutdownFuture {
                kind: FutureKind::Rejected(Some(Ok(response))),
                _guard: None,
            };
        }

        GracefulShutdownFuture {
            _guard: Some(self.state.enter()),
            kind: FutureKind::Inner(self.inner.call(req)),
        }
    }
}

#[pin_project]
pub struct GracefulShutdownFuture<F, B, E> {
    #[pin]
    kind: FutureKind<F, B, E>,
    _guard: Option<InFlightGuard>,
}

#[pin_project(project = FutureKindProj)]
enum FutureKind<F, B, E> {
    Inner(#[pin] F),
    Rejected(Option<Result<Response<B>, E>>),
}

impl<F, B, E> Future for GracefulShutdownFuture<F, B, E>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.kind.project() {
            FutureKindProj::Inner(fut) => {
                let result = fut.poll(cx);
                if result.is_ready() {
                    this._guard.take();
                }
                result
            }
            FutureKindProj::Rejected(response) => match response.take() {
                Some(response) => Poll::Ready(response),
                None => Poll::Pending,
            },
        }
    }
}
