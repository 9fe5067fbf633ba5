use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use runtime::capacity::{CapacityExceeded, Ceiling};

use crate::projection::{ProjectionInput, ProjectionMode, ScreenPoint};
use crate::uniforms::Uniforms;

/// Everything a backend needs to project one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionBatch {
    pub inputs: Vec<ProjectionInput>,
    pub mode: ProjectionMode,
    pub uniforms: Uniforms,
}

impl ProjectionBatch {
    pub fn new(inputs: Vec<ProjectionInput>, mode: ProjectionMode, uniforms: Uniforms) -> Self {
        Self {
            inputs,
            mode,
            uniforms,
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Reasons a batch was not dispatched. Nothing is truncated; the caller retries later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionRejected {
    Empty,
    Busy,
    TooManyPoints(CapacityExceeded),
    TooManyTransforms(CapacityExceeded),
}

impl std::fmt::Display for ProjectionRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectionRejected::Empty => write!(f, "projection batch is empty"),
            ProjectionRejected::Busy => write!(f, "a projection request is already in flight"),
            ProjectionRejected::TooManyPoints(e) => write!(f, "{e}"),
            ProjectionRejected::TooManyTransforms(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ProjectionRejected {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    Device(String),
    Readback(String),
    LengthMismatch { expected: usize, got: usize },
    Disconnected,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Device(msg) => write!(f, "projection device error: {msg}"),
            BackendError::Readback(msg) => write!(f, "projection readback failed: {msg}"),
            BackendError::LengthMismatch { expected, got } => {
                write!(f, "projection returned {got} points, expected {expected}")
            }
            BackendError::Disconnected => write!(f, "projection completion channel closed"),
        }
    }
}

impl std::error::Error for BackendError {}

struct Message {
    ticket: u64,
    result: Result<Vec<ScreenPoint>, BackendError>,
}

/// Handle a backend uses to report one dispatched batch.
///
/// It is `Send`, so a device callback may complete it from any thread.
pub struct Completion {
    ticket: u64,
    tx: Sender<Message>,
}

impl Completion {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn complete(self, points: Vec<ScreenPoint>) {
        self.send(Ok(points));
    }

    pub fn fail(self, error: BackendError) {
        self.send(Err(error));
    }

    fn send(self, result: Result<Vec<ScreenPoint>, BackendError>) {
        // The stage may have been dropped; nobody is waiting then.
        let _ = self.tx.send(Message {
            ticket: self.ticket,
            result,
        });
    }
}

pub trait ProjectionBackend {
    /// Starts projecting `batch`. The result arrives through `done`, possibly
    /// before this returns.
    fn dispatch(&mut self, batch: &ProjectionBatch, done: Completion) -> Result<(), BackendError>;

    /// Gives the backend a chance to make progress without blocking.
    fn pump(&mut self) {}
}

/// A finished request with the batch and context it was submitted with.
#[derive(Debug)]
pub struct Projected<C> {
    pub points: Vec<ScreenPoint>,
    pub batch: ProjectionBatch,
    pub context: C,
}

struct InFlight<C> {
    ticket: u64,
    batch: ProjectionBatch,
    context: C,
}

/// Asynchronous projection with a single request in flight.
pub struct ProjectionStage<B, C> {
    backend: B,
    points: Ceiling,
    transforms: Ceiling,
    next_ticket: u64,
    in_flight: Option<InFlight<C>>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl<B: ProjectionBackend, C> ProjectionStage<B, C> {
    pub fn new(backend: B, max_points: usize, max_transforms: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            backend,
            points: Ceiling::new("projection points", max_points),
            transforms: Ceiling::new("transforms", max_transforms),
            next_ticket: 0,
            in_flight: None,
            tx,
            rx,
        }
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Dispatches `batch`; `context` is handed back with the points.
    pub fn submit(&mut self, batch: ProjectionBatch, context: C) -> Result<u64, ProjectionRejected> {
        if batch.is_empty() {
            return Err(ProjectionRejected::Empty);
        }
        if self.in_flight.is_some() {
            return Err(ProjectionRejected::Busy);
        }
        self.points
            .check(batch.len())
            .map_err(ProjectionRejected::TooManyPoints)?;
        self.transforms
            .check(batch.mode.transform_count())
            .map_err(ProjectionRejected::TooManyTransforms)?;

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let done = Completion {
            ticket,
            tx: self.tx.clone(),
        };
        if let Err(error) = self.backend.dispatch(&batch, done) {
            tracing::warn!(ticket, %error, "projection dispatch failed");
            let _ = self.tx.send(Message {
                ticket,
                result: Err(error),
            });
        }
        tracing::trace!(ticket, points = batch.len(), "projection submitted");
        self.in_flight = Some(InFlight {
            ticket,
            batch,
            context,
        });
        Ok(ticket)
    }

    /// Returns the in-flight result once it has arrived.
    pub fn poll(&mut self) -> Option<Result<Projected<C>, BackendError>> {
        self.in_flight.as_ref()?;
        self.backend.pump();

        loop {
            let message = match self.rx.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.in_flight = None;
                    return Some(Err(BackendError::Disconnected));
                }
            };
            let current = self.in_flight.as_ref().map(|f| f.ticket);
            if current != Some(message.ticket) {
                tracing::trace!(ticket = message.ticket, "dropping stale projection result");
                continue;
            }
            let InFlight { batch, context, .. } = self.in_flight.take()?;
            let points = match message.result {
                Ok(points) => points,
                Err(error) => return Some(Err(error)),
            };
            if points.len() != batch.len() {
                return Some(Err(BackendError::LengthMismatch {
                    expected: batch.len(),
                    got: points.len(),
                }));
            }
            return Some(Ok(Projected {
                points,
                batch,
                context,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::FlatProjection;
    use foundation::time::Time;
    use glam::{Mat4, Vec2};

    /// Holds completions until the test releases them.
    #[derive(Default)]
    struct Deferred {
        pending: Vec<(Completion, usize)>,
        truncate: bool,
    }

    impl ProjectionBackend for Deferred {
        fn dispatch(&mut self, batch: &ProjectionBatch, done: Completion) -> Result<(), BackendError> {
            self.pending.push((done, batch.len()));
            Ok(())
        }
    }

    impl Deferred {
        fn release(&mut self) {
            let truncate = self.truncate;
            for (done, len) in self.pending.drain(..) {
                let len = if truncate { len - 1 } else { len };
                done.complete(vec![ScreenPoint::HIDDEN; len]);
            }
        }
    }

    struct Broken;

    impl ProjectionBackend for Broken {
        fn dispatch(&mut self, _: &ProjectionBatch, _: Completion) -> Result<(), BackendError> {
            Err(BackendError::Device("lost".into()))
        }
    }

    fn batch(points: usize, transforms: usize) -> ProjectionBatch {
        ProjectionBatch::new(
            vec![ProjectionInput::new(Vec2::ZERO, 0); points],
            ProjectionMode::Flat(FlatProjection {
                matrices: vec![Mat4::IDENTITY; transforms],
            }),
            Uniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec2::new(10.0, 10.0), Time::ZERO),
        )
    }

    #[test]
    fn rejects_empty_oversized_and_busy() {
        let mut stage: ProjectionStage<Deferred, &str> = ProjectionStage::new(Deferred::default(), 4, 2);
        assert_eq!(stage.submit(batch(0, 1), "a"), Err(ProjectionRejected::Empty));
        assert!(matches!(
            stage.submit(batch(5, 1), "a"),
            Err(ProjectionRejected::TooManyPoints(_))
        ));
        assert!(matches!(
            stage.submit(batch(1, 3), "a"),
            Err(ProjectionRejected::TooManyTransforms(_))
        ));
        assert!(!stage.is_busy());

        stage.submit(batch(2, 1), "a").unwrap();
        assert_eq!(stage.submit(batch(2, 1), "b"), Err(ProjectionRejected::Busy));
    }

    #[test]
    fn context_comes_back_after_completion() {
        let mut stage = ProjectionStage::new(Deferred::default(), 8, 8);
        stage.submit(batch(3, 1), 42u32).unwrap();
        assert!(stage.poll().is_none());

        stage.backend_mut().release();
        let projected = stage.poll().unwrap().unwrap();
        assert_eq!(projected.context, 42);
        assert_eq!(projected.points.len(), 3);
        assert!(!stage.is_busy());
        assert!(stage.poll().is_none());
    }

    #[test]
    fn short_result_is_reported() {
        let mut stage = ProjectionStage::new(Deferred::default(), 8, 8);
        stage.backend_mut().truncate = true;
        stage.submit(batch(3, 1), ()).unwrap();
        stage.backend_mut().release();
        let err = stage.poll().unwrap().unwrap_err();
        assert_eq!(err, BackendError::LengthMismatch { expected: 3, got: 2 });
    }

    #[test]
    fn dispatch_failure_surfaces_on_poll() {
        let mut stage = ProjectionStage::new(Broken, 8, 8);
        stage.submit(batch(1, 1), ()).unwrap();
        let err = stage.poll().unwrap().unwrap_err();
        assert_eq!(err, BackendError::Device("lost".into()));
        assert!(!stage.is_busy());
    }
}
