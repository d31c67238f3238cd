use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::sampling::emotion_feed::EmotionFeed;
use crate::sampling::emotion_sampling_loop::EmotionSamplingLoop;

/// How long the worker blocks on the scheduler or the command channel
/// before checking for new commands or readiness changes.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub enum LoopCommand {
    SetActive(bool),
    Refresh,
    Shutdown,
}

/// Runs an [`EmotionSamplingLoop`] on its own thread.
///
/// While idle the worker re-checks the loop's run conditions every poll
/// interval, so a detector that finishes loading in the background starts
/// the loop without any extra signal.
pub struct SamplingWorker {
    commands: Sender<LoopCommand>,
    feed: EmotionFeed,
    handle: Option<JoinHandle<Option<String>>>,
}

impl SamplingWorker {
    pub fn spawn(sampler: EmotionSamplingLoop) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<LoopCommand>();
        let feed = sampler.feed();

        let handle = thread::spawn(move || {
            let mut sampler = sampler;
            loop {
                let command = if sampler.is_running() {
                    match rx.try_recv() {
                        Ok(command) => Some(command),
                        Err(crossbeam_channel::TryRecvError::Empty) => {
                            sampler.pump(POLL_INTERVAL);
                            None
                        }
                        Err(crossbeam_channel::TryRecvError::Disconnected) => {
                            Some(LoopCommand::Shutdown)
                        }
                    }
                } else {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(command) => Some(command),
                        Err(RecvTimeoutError::Timeout) => Some(LoopCommand::Refresh),
                        Err(RecvTimeoutError::Disconnected) => Some(LoopCommand::Shutdown),
                    }
                };

                match command {
                    Some(LoopCommand::SetActive(active)) => sampler.set_active(active),
                    Some(LoopCommand::Refresh) => sampler.refresh(),
                    Some(LoopCommand::Shutdown) => break,
                    None => {}
                }
            }
            sampler.teardown();
            sampler.summary()
        });

        Self {
            commands: tx,
            feed,
            handle: Some(handle),
        }
    }

    pub fn feed(&self) -> EmotionFeed {
        self.feed.clone()
    }

    pub fn set_active(&self, active: bool) {
        let _ = self.commands.send(LoopCommand::SetActive(active));
    }

    pub fn refresh(&self) {
        let _ = self.commands.send(LoopCommand::Refresh);
    }

    /// Tears the loop down, joins the thread and returns the logger summary.
    pub fn shutdown(mut self) -> Option<String> {
        self.stop()
    }

    fn stop(&mut self) -> Option<String> {
        let handle = self.handle.take()?;
        let _ = self.commands.send(LoopCommand::Shutdown);
        match handle.join() {
            Ok(summary) => summary,
            Err(_) => {
                log::error!("Sampling worker panicked");
                None
            }
        }
    }
}

impl Drop for SamplingWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
