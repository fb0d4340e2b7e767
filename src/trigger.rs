// Lazy load trigger module
// One-shot wake signals that start a background load for one image

use crossbeam_channel::{bounded, Receiver, Sender};

/// The canvas side of a one-shot wake signal
#[derive(Debug)]
pub enum LoadTrigger {
    /// Not fired yet; holds the sending half of the wake channel
    Armed(Sender<()>),
    /// Already consumed
    Fired,
}

/// The worker side of a one-shot wake signal
#[derive(Debug)]
pub struct WakeSignal(Receiver<()>);

impl LoadTrigger {
    /// Create an armed trigger and the signal it wakes.
    ///
    /// The channel holds one message so firing never blocks the caller.
    pub fn pair() -> (LoadTrigger, WakeSignal) {
        let (tx, rx) = bounded(1);
        (LoadTrigger::Armed(tx), WakeSignal(rx))
    }

    /// Wake the worker if still armed. Returns whether a wake was sent.
    pub fn fire(&mut self) -> bool {
        match std::mem::replace(self, LoadTrigger::Fired) {
            LoadTrigger::Armed(tx) => tx.try_send(()).is_ok(),
            LoadTrigger::Fired => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        matches!(self, LoadTrigger::Fired)
    }
}

impl WakeSignal {
    /// Block until woken. Returns false if the trigger was dropped unfired.
    pub fn wait(&self) -> bool {
        self.0.recv().is_ok()
    }
}
