//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Task loop for a monitored thread
//!
//! [`EventLoop`] is a minimal run loop a host thread can drive. Its
//! [`LoopHandle`] is the [`ThreadAccessor`] the detector posts pings through,
//! and [`LoopThreadProvider`] reports that same thread for stack capture.
//!
//! ```rust
//! use anr_pulse::event_loop::EventLoop;
//! use anr_pulse::ThreadAccessor;
//!
//! let (handle, worker) = EventLoop::spawn("ui").unwrap();
//! handle.post(Box::new(|| println!("running on the ui thread"))).unwrap();
//! handle.quit().unwrap();
//! worker.join().unwrap();
//! ```

#![forbid(unsafe_code)]

use std::io;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::accessor::{PostError, Task, ThreadAccessor};
use crate::stack::CaptureError;
use crate::threads::{self, RegistrationGuard, ThreadHandle, ThreadSnapshotProvider};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

enum Message {
    Run(Task),
    Quit,
}

struct LoopShared {
    bound: OnceLock<ThreadHandle>,
}

/// Run loop owned by the monitored thread
pub struct EventLoop {
    receiver: Receiver<Message>,
    shared: Arc<LoopShared>,
    registration: Option<RegistrationGuard>,
}

/// Cloneable handle that posts work onto an [`EventLoop`]
#[derive(Clone)]
pub struct LoopHandle {
    sender: Sender<Message>,
    shared: Arc<LoopShared>,
}

impl EventLoop {
    /// Create an unbound loop and its handle
    ///
    /// The loop binds to whichever thread first calls [`run`](Self::run) or
    /// [`pump`](Self::pump).
    #[must_use]
    pub fn new() -> (Self, LoopHandle) {
        let (sender, receiver) = channel::unbounded();
        let shared = Arc::new(LoopShared {
            bound: OnceLock::new(),
        });

        let event_loop = Self {
            receiver,
            shared: shared.clone(),
            registration: None,
        };
        (event_loop, LoopHandle { sender, shared })
    }

    /// Spawn a named thread running a fresh loop
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn(name: impl Into<String>) -> io::Result<(LoopHandle, JoinHandle<()>)> {
        let (event_loop, handle) = Self::new();
        let worker = thread::Builder::new()
            .name(name.into())
            .spawn(move || event_loop.run())?;
        Ok((handle, worker))
    }

    /// Process tasks until [`LoopHandle::quit`] or until every handle is dropped
    pub fn run(mut self) {
        self.bind();

        #[cfg(feature = "tracing")]
        info!(thread = ?thread::current().name(), "Event loop running");

        for message in self.receiver.iter() {
            match message {
                Message::Run(task) => task(),
                Message::Quit => break,
            }
        }

        #[cfg(feature = "tracing")]
        info!(thread = ?thread::current().name(), "Event loop stopped");
    }

    /// Run every task already queued without waiting for more
    ///
    /// Returns the number of tasks executed, or `None` once the loop was told
    /// to quit or all handles are gone.
    pub fn pump(&mut self) -> Option<usize> {
        self.bind();

        let mut executed = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(Message::Run(task)) => {
                    task();
                    executed += 1;
                }
                Ok(Message::Quit) | Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => return Some(executed),
            }
        }
    }

    fn bind(&mut self) {
        if self.registration.is_some() {
            return;
        }

        let guard = threads::register_current_thread();
        if self.shared.bound.set(guard.handle().clone()).is_err() {
            #[cfg(feature = "tracing")]
            debug!("Event loop already bound to another thread");
        }
        self.registration = Some(guard);
    }
}

impl LoopHandle {
    /// Ask the loop to return after the tasks queued before this call
    ///
    /// # Errors
    ///
    /// Returns [`PostError::Disconnected`] if the loop is already gone.
    pub fn quit(&self) -> Result<(), PostError> {
        self.sender
            .send(Message::Quit)
            .map_err(|_| PostError::Disconnected)
    }

    /// Handle of the thread running the loop, once it started
    pub fn thread_handle(&self) -> Option<ThreadHandle> {
        self.shared.bound.get().cloned()
    }

    /// Provider reporting the loop's thread
    pub fn thread_provider(&self) -> LoopThreadProvider {
        LoopThreadProvider {
            shared: self.shared.clone(),
        }
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

impl ThreadAccessor for LoopHandle {
    fn post(&self, task: Task) -> Result<(), PostError> {
        self.sender
            .send(Message::Run(task))
            .map_err(|_| PostError::Disconnected)
    }

    fn is_current_thread(&self) -> bool {
        self.shared
            .bound
            .get()
            .is_some_and(|bound| bound.id() == thread::current().id())
    }
}

/// Provider returning the single thread that runs an [`EventLoop`]
#[derive(Clone)]
pub struct LoopThreadProvider {
    shared: Arc<LoopShared>,
}

impl ThreadSnapshotProvider for LoopThreadProvider {
    fn threads(&self) -> Result<Vec<ThreadHandle>, CaptureError> {
        self.shared
            .bound
            .get()
            .map(|handle| vec![handle.clone()])
            .ok_or(CaptureError::NotBound)
    }
}
