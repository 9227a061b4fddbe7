use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::error;
use rusb::Context;

use keene_fm::device::{KEENE_PRODUCT_ID, KEENE_VENDOR_ID};
use keene_fm::{apply, encode, DeviceFilter, Error, MatchMode, RawSettings};

/// Configure a Keene USB FM transmitter.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Transmission gain [0..7], default 7
    #[arg(short, long, value_name = "GAIN", allow_hyphen_values = true)]
    gain: Option<String>,

    /// Number of channels [1..2], default 2
    #[arg(short, long, value_name = "NCHAN", allow_hyphen_values = true)]
    channels: Option<String>,

    /// Transmission frequency [76.00..108.00]; 0 leaves it unchanged
    #[arg(short, long, value_name = "FREQ", allow_hyphen_values = true)]
    frequency: Option<String>,

    /// PA level [30..120], default 120
    #[arg(short = 'P', long = "PA", value_name = "PA", allow_hyphen_values = true)]
    pa: Option<String>,

    /// Transmitter slot [0..23], replaces the gain setting
    #[arg(short, long, value_name = "INDEX", allow_hyphen_values = true)]
    transmitter: Option<String>,

    /// 75us emphasis instead of 50us
    #[arg(short, long)]
    emphasis: bool,

    /// Do not transmit
    #[arg(short, long)]
    disable: bool,

    /// Transmit silence
    #[arg(short, long)]
    mute: bool,

    /// Print more to stderr
    #[arg(short, long)]
    verbose: bool,

    /// USB vendor id, hex
    #[arg(long, value_parser = parse_hex, default_value = "046d")]
    vendor_id: u16,

    /// USB product id, hex
    #[arg(long, value_parser = parse_hex, default_value = "0a0e")]
    product_id: u16,

    /// Accept any device from the vendor, whatever its product id
    #[arg(long)]
    vendor_only: bool,

    /// Encode and print the frames without touching the device
    #[arg(long)]
    dry_run: bool,
}

fn parse_hex(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("{s:?} is not a 16 bit hex id: {e}"))
}

impl Args {
    fn raw_settings(&self) -> RawSettings {
        RawSettings {
            gain: self.gain.clone(),
            channels: self.channels.clone(),
            frequency: self.frequency.clone(),
            power: self.pa.clone(),
            transmitter: self.transmitter.clone(),
            pre_emphasis_75us: self.emphasis,
            disabled: self.disable,
            muted: self.mute,
        }
    }

    fn filter(&self) -> DeviceFilter {
        DeviceFilter {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            mode: if self.vendor_only {
                MatchMode::VendorOnly
            } else {
                MatchMode::Strict
            },
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let settings = args.raw_settings().validate()?;

    if args.dry_run {
        let frames = encode(&settings)?;
        println!("{}", frames.tuning);
        println!("{}", frames.audio);
        return Ok(());
    }

    let context = Context::new().map_err(Error::Enumeration)?;
    apply(&context, &args.filter(), &settings)
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).try_init()?;

    if (args.vendor_id, args.product_id) != (KEENE_VENDOR_ID, KEENE_PRODUCT_ID) {
        log::info!(
            "using device id {:04x}:{:04x}",
            args.vendor_id,
            args.product_id
        );
    }

    match run(&args) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            let mut message = e.to_string();
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                message.push_str(&format!(": {cause}"));
                source = cause.source();
            }
            if let Error::TransferFailed { cause: Some(cause), .. } = &e {
                message.push_str(&format!(": {cause}"));
            }
            error!("{message}");
            Ok(ExitCode::from(e.exit_code() as u8))
        }
    }
}
