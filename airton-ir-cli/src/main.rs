extern crate pretty_env_logger;
#[macro_use]
extern crate log;

use airton_ir::ir::airton::driver::{self, AirtonDriver};
use airton_ir::ir::airton::types::{ClimateMode, FanSpeed};
use airton_ir::ir::airton::Airton;
use airton_ir::ir::format::AirtonFormat;
use airton_ir::ir::input::{EdgeMessage, IrIn};
use airton_ir::ir::output::{demodulate, CarrierStep, IrOut, IrSink};
use airton_ir::ir::switch::SwitchAction;
use airton_ir::ir::types::{IrFrame, IrPulse, IrTarget};
use eyre::{eyre, Result, WrapErr};
use std::num::ParseIntError;
use std::time::Duration;
use structopt::StructOpt;
use tokio::pin;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

fn parse_byte(src: &str) -> std::result::Result<u8, ParseIntError> {
    u8::from_str_radix(src.trim_start_matches("0x"), 16)
}

#[derive(StructOpt, Debug)]
struct ClimateState {
    #[structopt(short, long)]
    unpowered: bool,
    #[structopt(short, long, default_value = "cool")]
    mode: ClimateMode,
    #[structopt(short, long, default_value = "24")]
    temperature: i32,
    #[structopt(short, long, default_value = "auto")]
    fan: FanSpeed,
    #[structopt(long)]
    swing: bool,
    #[structopt(long)]
    sleep: bool,
    /// Turn the unit's display off
    #[structopt(long)]
    no_display: bool,
}

impl ClimateState {
    fn driver(&self) -> driver::Result<AirtonDriver> {
        let mut driver = AirtonDriver::default();
        driver.set_mode(self.mode)?;
        driver.set_temperature(self.temperature)?;
        driver.set_fan_speed(self.fan)?;
        driver.set_swing(self.swing)?;
        driver.set_sleep(self.sleep)?;
        driver.set_display(!self.no_display)?;
        if self.unpowered {
            driver.set_power(false)?;
        }
        Ok(driver)
    }
}

#[derive(StructOpt, Debug)]
enum Opt {
    /// Print the frame for a climate state
    Encode(ClimateState),
    /// Print the climate state carried by a frame
    Decode {
        /// Treat values as the 7 state bytes in hex instead of pulse lengths
        #[structopt(long)]
        hex: bool,

        /// Alternating mark and space lengths in microseconds, or bytes
        values: Vec<String>,
    },
    /// Send a state through the emitter and receiver pipeline to a unit
    Simulate(ClimateState),
    /// Apply a switch action to a climate state and print the new frame
    Action {
        /// Action name, with or without the climate_ir.airton. prefix
        name: String,

        #[structopt(flatten)]
        state: ClimateState,
    },
}

/// Feeds emitted light straight back as receiver edges.
struct Reflector(mpsc::UnboundedSender<EdgeMessage>);

impl IrSink for Reflector {
    type Error = mpsc::error::SendError<EdgeMessage>;

    fn emit(&mut self, steps: &[CarrierStep]) -> std::result::Result<(), Self::Error> {
        for pulse in demodulate(steps) {
            self.0
                .send(EdgeMessage::Pulse(Duration::from_micros(u64::from(pulse.0))))?;
        }
        self.0.send(EdgeMessage::Timeout)
    }
}

fn print_frame(driver: &mut AirtonDriver) {
    println!("State: {}", driver.command());
    println!("Bytes: {}", driver.state_bytes());
    let frame = driver.transmit();
    println!("Pulses: {}", frame);
    println!("Duration: {}us", frame.duration());
}

async fn simulate(state: ClimateState) -> Result<()> {
    let mut remote = state.driver()?;

    let (edge_sender, edge_receiver) = mpsc::unbounded_channel();
    let mut ir_in = IrIn::start(UnboundedReceiverStream::new(edge_receiver));
    let frame_stream = ir_in.frame_stream();
    pin!(frame_stream);
    let mut ir_out = IrOut::with_format::<AirtonFormat, _>(Reflector(edge_sender));

    let mut unit = AirtonDriver::default();
    unit.register_observer(|change| println!("Unit changed {}", change));

    println!("Remote sends {}", remote.command());
    remote.step(&mut ir_out)?;
    let captured = timeout(RECEIVE_TIMEOUT, frame_stream.next())
        .await
        .wrap_err("Timed out waiting for frame")?
        .ok_or_else(|| eyre!("Receiver stopped"))??
        .ok_or_else(|| eyre!("No frame captured"))?;
    debug!("captured frame: {}", captured);

    let changes = unit.on_frame_received(&captured)?;
    println!("Unit now {} ({} changes)", unit.command(), changes.len());

    ir_out.stop().await?;
    ir_in.stop().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    color_eyre::install()?;

    let opts = Opt::from_args();

    debug!("opts: {:?}", opts);

    match opts {
        Opt::Encode(state) => print_frame(&mut state.driver()?),
        Opt::Decode { hex, values } => {
            let command = if hex {
                let bytes = values
                    .iter()
                    .map(|v| parse_byte(v))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .wrap_err("Could not parse bytes")?;
                Airton::decode_bytes(&bytes)?
            } else {
                let pulses = values
                    .iter()
                    .map(|v| v.parse().map(IrPulse))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .wrap_err("Could not parse pulses")?;
                Airton::decode(&IrFrame::from_pulses(pulses))?
            };
            println!("Decoded: {}", command);
        }
        Opt::Simulate(state) => simulate(state).await?,
        Opt::Action { name, state } => {
            let mut driver = state.driver()?;
            driver.transmit();
            SwitchAction::parse(&name)?.apply(&mut driver)?;
            if driver.is_dirty() {
                print_frame(&mut driver);
            } else {
                println!("Nothing changed");
            }
        }
    }

    Ok(())
}
