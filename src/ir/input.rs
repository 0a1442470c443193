use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;

use async_stream::{stream, try_stream};
use thiserror::Error;
use tokio::{
    pin,
    sync::watch,
    task::{spawn, JoinHandle},
};
use tokio_stream::{Stream, StreamExt};

use crate::ir::types::{IrFrame, IrPulse};

pub type CapturedFrame = Arc<IrFrame>;

const DEBOUNCE: Duration = Duration::from_micros(100);
const MAX_PULSE: Duration = Duration::from_millis(10);
/// Captured frames kept for inspection, oldest dropped first.
pub const FRAME_HISTORY: usize = 16;

/// What the receiver hardware reports: the length of the level that just
/// ended, or that the line has been idle for a while.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EdgeMessage {
    Pulse(Duration),
    Timeout,
}

#[derive(Error, Clone, Debug)]
pub enum IrInError {
    #[error("Could not acquire lock for frames")]
    FramesLock,
    #[error("Could not send stop to ir reader")]
    Send,
    #[error("Could not wait for ir reader task to stop")]
    ThreadWait,
    #[error("Could not get next frame")]
    FrameReceive,
}

pub type Result<T> = std::result::Result<T, IrInError>;

/// Collects captured frames from a stream of edge messages in the background.
#[derive(Debug)]
pub struct IrIn {
    read_handle: JoinHandle<()>,
    read_stop_sender: watch::Sender<bool>,
    frames: Arc<RwLock<VecDeque<CapturedFrame>>>,
    frame_added_receiver: watch::Receiver<Option<CapturedFrame>>,
}

impl IrIn {
    pub fn start<S: Stream<Item = EdgeMessage> + Send + Unpin + 'static>(edges: S) -> IrIn {
        let (read_stop_sender, mut read_stop_receiver) = watch::channel(false);
        let frames = Arc::new(RwLock::new(VecDeque::with_capacity(FRAME_HISTORY)));
        let (frame_added_sender, frame_added_receiver) = watch::channel(None);
        let read_handle = {
            let frames = frames.clone();
            spawn(async move {
                let frame_stream = Self::frames(edges);
                pin!(frame_stream);
                loop {
                    tokio::select! {
                        _ = read_stop_receiver.changed() => {
                            trace!("stopping ir receiver task");
                            break;
                        }
                        frame = frame_stream.next() => match frame {
                            Some(frame) => match frames.write() {
                                Err(_) => {
                                    error!("could not get write lock for frame history");
                                    break;
                                }
                                Ok(mut lock) => {
                                    trace!("finished frame of {} pairs", frame.len());
                                    let frame = Arc::new(frame);
                                    Self::remember(&mut lock, frame.clone());
                                    if let Err(e) = frame_added_sender.send(Some(frame)) {
                                        error!("could not send to frame added sender: {:?}", e);
                                    }
                                }
                            },
                            None => {
                                info!("ir edge source disconnected");
                                break;
                            }
                        }
                    }
                }
            })
        };
        IrIn {
            read_handle,
            read_stop_sender,
            frames,
            frame_added_receiver,
        }
    }

    /// Groups edges into frames, one per burst ended by an idle timeout.
    pub fn frames<S: Stream<Item = EdgeMessage> + Unpin>(edges: S) -> impl Stream<Item = IrFrame> {
        stream! {
            let edges = Self::debounce(edges).map(Self::normalize);
            pin!(edges);
            let mut sequence = Vec::new();
            while let Some(message) = edges.next().await {
                match message {
                    EdgeMessage::Pulse(duration) => {
                        if duration > MAX_PULSE {
                            trace!("pulse duration is huge ({}us), probably from waiting for signal so skipping", duration.as_micros());
                        } else {
                            sequence.push(IrPulse(duration.as_micros() as u32));
                        }
                    }
                    EdgeMessage::Timeout => {
                        if !sequence.is_empty() {
                            yield IrFrame::from_pulses(&sequence);
                            sequence.clear();
                        }
                    }
                }
            }
        }
    }

    fn debounce<S: Stream<Item = EdgeMessage> + Unpin>(
        mut input_stream: S,
    ) -> impl Stream<Item = EdgeMessage> {
        stream! {
            let mut last: Option<Duration> = None;
            while let Some(input) = input_stream.next().await {
                match input {
                    EdgeMessage::Timeout => {
                        if let Some(l) = last {
                            yield EdgeMessage::Pulse(l);
                            last = None;
                        }
                        yield EdgeMessage::Timeout;
                    },
                    EdgeMessage::Pulse(duration) => {
                        match last.as_mut() {
                            Some(l) if *l + duration > DEBOUNCE => {
                                yield EdgeMessage::Pulse(*l + duration);
                                last = None;
                            },
                            Some(l) => {
                                *l += duration;
                            },
                            None if duration > DEBOUNCE => {
                                yield EdgeMessage::Pulse(duration);
                            },
                            None => {
                                last = Some(duration);
                            },
                        }
                    }
                }
            }
        }
    }

    fn normalize(input: EdgeMessage) -> EdgeMessage {
        fn round(i: u128, fac: u128) -> u128 {
            match i % fac {
                rem if rem >= fac / 2 => i + (fac - rem),
                rem => i - rem,
            }
        }
        match input {
            EdgeMessage::Pulse(duration) => {
                EdgeMessage::Pulse(Duration::from_micros(match duration.as_micros() {
                    m if m < 1000 => round(m, 10),
                    m if m < 2000 => round(m, 50),
                    m => round(m, 200),
                } as u64))
            }
            EdgeMessage::Timeout => EdgeMessage::Timeout,
        }
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.read_stop_sender
            .send(true)
            .map_err(|_| IrInError::Send)?;
        (&mut self.read_handle)
            .await
            .map_err(|_| IrInError::ThreadWait)
    }

    fn remember(history: &mut VecDeque<CapturedFrame>, frame: CapturedFrame) {
        if history.len() == FRAME_HISTORY {
            history.pop_front();
        }
        history.push_back(frame);
    }

    /// The most recent frames, oldest first.
    pub fn frames_received(&self) -> Result<RwLockReadGuard<VecDeque<CapturedFrame>>> {
        self.frames.read().map_err(|_| IrInError::FramesLock)
    }

    pub fn frame_stream(&self) -> impl Stream<Item = Result<Option<CapturedFrame>>> {
        let mut receiver = self.frame_added_receiver.clone();
        try_stream! {
            loop {
                receiver.changed().await.map_err(|_| IrInError::FrameReceive)?;
                yield receiver.borrow().clone();
            }
        }
    }
}
