use std::collections::VecDeque;
use std::sync::mpsc;
use std::time::Duration;

use core::iter;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{spawn_blocking, JoinHandle};

use crate::ir::types::{IrFormat, IrFrame, IrPulse};

const WAIT_TIMEOUT: Duration = Duration::from_micros(100);

/// The hardware side of the protocol: sends frames as light and captures
/// frames from light.
pub trait IrTransceiver {
    type Error: std::error::Error + Send + Sync + 'static;
    fn send(&mut self, frame: &IrFrame) -> std::result::Result<(), Self::Error>;
    fn receive(&mut self) -> std::result::Result<IrFrame, Self::Error>;
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum LoopbackError {
    #[error("Nothing was sent to receive")]
    Empty,
}

/// Receives exactly what was sent, in order.
#[derive(Debug, Default)]
pub struct Loopback {
    queue: VecDeque<IrFrame>,
    sent: usize,
}

impl Loopback {
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl IrTransceiver for Loopback {
    type Error = LoopbackError;

    fn send(&mut self, frame: &IrFrame) -> std::result::Result<(), Self::Error> {
        trace!("looping back frame of {} pairs", frame.len());
        self.queue.push_back(frame.clone());
        self.sent += 1;
        Ok(())
    }

    fn receive(&mut self) -> std::result::Result<IrFrame, Self::Error> {
        self.queue.pop_front().ok_or(LoopbackError::Empty)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CarrierPulse {
    pub period: Duration,
    pub pulse_width: Duration,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CarrierStep {
    Pulse(CarrierPulse),
    Wait(Duration),
}

/// Expands marks into carrier cycles (one third duty) and spaces into waits.
pub fn modulate(frame: &IrFrame, carrier_frequency: u32) -> Vec<CarrierStep> {
    let period = Duration::from_nanos(1_000_000_000 / u64::from(carrier_frequency.max(1)));
    let pulse = CarrierPulse {
        period,
        pulse_width: period / 3,
    };
    frame.pulses().enumerate().fold(Vec::new(), |mut acc, (i, length)| {
        if i % 2 == 0 {
            let cycles = u128::from(length.0) * 1000 / period.as_nanos().max(1);
            acc.extend(iter::repeat(CarrierStep::Pulse(pulse)).take(cycles as usize));
        } else if length.0 > 0 {
            acc.push(CarrierStep::Wait(Duration::from_micros(u64::from(length.0))));
        }
        acc
    })
}

/// Folds carrier steps back into alternating mark/space lengths.
pub fn demodulate(steps: &[CarrierStep]) -> Vec<IrPulse> {
    let mut pulses = Vec::new();
    let mut mark = Duration::ZERO;
    for step in steps {
        match step {
            CarrierStep::Pulse(p) => mark += p.period,
            CarrierStep::Wait(space) => {
                pulses.push(IrPulse(mark.as_micros() as u32));
                pulses.push(IrPulse(space.as_micros() as u32));
                mark = Duration::ZERO;
            }
        }
    }
    if !mark.is_zero() {
        pulses.push(IrPulse(mark.as_micros() as u32));
    }
    pulses
}

/// Drives the emitter with a modulated frame.
pub trait IrSink: Send + 'static {
    type Error: std::error::Error + Send + Sync + 'static;
    fn emit(&mut self, steps: &[CarrierStep]) -> std::result::Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum IrOutError {
    #[error("Could not send message to ir thread")]
    Send,
    #[error("Could not wait for ir thread to stop")]
    ThreadWait,
    #[error("Ir output can not receive")]
    Receive,
}

pub type Result<T> = std::result::Result<T, IrOutError>;

/// Background sender handing modulated frames to a sink one at a time.
pub struct IrOut {
    frame_sender: mpsc::Sender<IrFrame>,
    send_stop_sender: watch::Sender<bool>,
    send_handle: JoinHandle<()>,
}

impl IrOut {
    pub fn start<S: IrSink>(mut sink: S, carrier_frequency: u32) -> IrOut {
        let (send_stop_sender, send_stop_receiver) = watch::channel(false);
        let (frame_sender, frame_receiver) = mpsc::channel::<IrFrame>();
        let send_handle = spawn_blocking(move || loop {
            match frame_receiver.recv_timeout(WAIT_TIMEOUT) {
                Ok(frame) => {
                    if let Err(e) = sink.emit(&modulate(&frame, carrier_frequency)) {
                        error!("Could not emit ir frame: {:?}", e);
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    // queue is drained, so check if stop received
                    if *send_stop_receiver.borrow() {
                        trace!("stopping ir sender thread");
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    trace!("ir frame queue closed, stopping ir sender thread");
                    break;
                }
            }
        });
        IrOut {
            frame_sender,
            send_stop_sender,
            send_handle,
        }
    }

    pub fn with_format<F: IrFormat, S: IrSink>(sink: S) -> IrOut {
        Self::start(sink, F::CARRIER_FREQUENCY)
    }

    pub fn send(&self, frame: IrFrame) -> Result<()> {
        debug!("sending frame: {}", frame);
        self.frame_sender.send(frame).map_err(|_| IrOutError::Send)
    }

    /// Stops the sender once queued frames are out.
    pub async fn stop(self) -> Result<()> {
        let IrOut {
            frame_sender,
            send_stop_sender,
            send_handle,
        } = self;
        send_stop_sender.send(true).map_err(|_| IrOutError::Send)?;
        drop(frame_sender);
        send_handle.await.map_err(|_| IrOutError::ThreadWait)
    }
}

impl IrTransceiver for IrOut {
    type Error = IrOutError;

    fn send(&mut self, frame: &IrFrame) -> Result<()> {
        IrOut::send(self, frame.clone())
    }

    fn receive(&mut self) -> Result<IrFrame> {
        Err(IrOutError::Receive)
    }
}
