use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use wsnlink_session::{ControlQueue, SessionConfig};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod inject;
#[cfg(unix)]
pub mod ping;
#[cfg(unix)]
pub mod sniff;
pub mod version;

/// Highest IEEE 802.15.4 channel number (2.4 GHz band).
pub const MAX_CHANNEL: u16 = 26;

/// Largest random filler that still fits a ping in one control message.
pub const MAX_PING_SIZE: i64 = 118;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture and display frames received by a sniffer firmware.
    #[cfg(unix)]
    Sniff(SniffArgs),
    /// Build a MAC frame and send it through an injector firmware.
    Inject(InjectArgs),
    /// Measure round trips to the firmware with PING control messages.
    #[cfg(unix)]
    Ping(PingArgs),
    /// Decode a hexadecimal MAC frame.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        #[cfg(unix)]
        Command::Sniff(args) => sniff::run(args, format),
        Command::Inject(args) => inject::run(args, format),
        #[cfg(unix)]
        Command::Ping(args) => ping::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every subcommand that opens the serial line.
#[derive(Args, Debug)]
pub struct LineArgs {
    /// Serial line speed (50 to 230400). Keeps the current speed when unset.
    #[arg(long, short = 'b', env = "WSNLINK_BAUD")]
    pub baud: Option<u32>,
    /// How long to wait for the firmware's ready byte (e.g. 10s, 500ms).
    #[arg(long, value_name = "DURATION", default_value = "10s")]
    pub ready_timeout: String,
}

impl LineArgs {
    pub fn session_config(&self, timeout: Option<Duration>) -> CliResult<SessionConfig> {
        let mut config = SessionConfig::default();
        #[cfg(unix)]
        {
            config.serial.baud = self.baud;
        }
        config.handshake.timeout = parse_duration(&self.ready_timeout)?;
        config.reader.timeout = timeout;
        Ok(config)
    }
}

#[cfg(unix)]
#[derive(Args, Debug)]
pub struct SniffArgs {
    /// Serial device the transceiver is attached to.
    #[arg(env = "WSNLINK_TTY")]
    pub tty: PathBuf,
    #[command(flatten)]
    pub line: LineArgs,
    /// Radio channel to listen on (0 to 26).
    #[arg(long, short = 'C', value_parser = parse_channel)]
    pub channel: Option<u16>,
    /// Stop after this long without input (e.g. 30s, 500ms).
    #[arg(long, short = 'T', value_name = "DURATION")]
    pub timeout: Option<String>,
    /// Save frames to a PCAP file.
    #[arg(long, short = 'p', value_name = "FILE")]
    pub pcap: Option<PathBuf>,
    /// Display frame control information.
    #[arg(long, short = 'c')]
    pub show_control: bool,
    /// Display the sequence number.
    #[arg(long, short = 's')]
    pub show_seqno: bool,
    /// Display address fields.
    #[arg(long, short = 'a')]
    pub show_addr: bool,
    /// Display security information.
    #[arg(long, short = 'S')]
    pub show_security: bool,
    /// Display all MAC header information.
    #[arg(long, short = 'M')]
    pub show_mac: bool,
    /// Dump the payload.
    #[arg(long, short = 'P')]
    pub show_payload: bool,
    /// Display everything.
    #[arg(long, short = 'A')]
    pub show_all: bool,
}

#[derive(Args, Debug)]
pub struct InjectArgs {
    /// Serial device the transceiver is attached to. Not needed with --dry-run.
    #[arg(env = "WSNLINK_TTY", required_unless_present = "dry_run")]
    pub tty: Option<PathBuf>,
    #[command(flatten)]
    pub line: LineArgs,
    /// Radio channel to send on (0 to 26).
    #[arg(long, short = 'C', value_parser = parse_channel)]
    pub channel: Option<u16>,
    /// How long to wait for the confirmation (e.g. 5s, 500ms). Waits forever
    /// when unset.
    #[arg(long, short = 'T', value_name = "DURATION")]
    pub timeout: Option<String>,
    /// Build the frame but do not send it.
    #[arg(long, short = 'n')]
    pub dry_run: bool,
    /// Display the frame before sending it.
    #[arg(long, short = 'D')]
    pub display: bool,
    /// Load the base frame from a file (raw MAC frame, no FCS).
    #[arg(long, short = 'f', value_name = "FILE")]
    pub frame: Option<PathBuf>,
    /// Frame control flags, e.g. `pending,ack`, `-p,+c`.
    #[arg(long = "flags", short = 'F', value_name = "LIST", allow_hyphen_values = true)]
    pub flags: Option<String>,
    /// Frame type: beacon, data, ack, cmd or a number.
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub frame_type: Option<String>,
    /// Value of the reserved control bits (0 to 7).
    #[arg(long, value_name = "BITS")]
    pub reserved: Option<String>,
    /// Force the source address mode: full, reserved, short, long.
    #[arg(long, value_name = "MODE")]
    pub sam: Option<String>,
    /// Force the destination address mode: full, reserved, short, long.
    #[arg(long, value_name = "MODE")]
    pub dam: Option<String>,
    /// MAC version: 2003, current or a number.
    #[arg(long, value_name = "VERSION")]
    pub mac_version: Option<String>,
    /// Source address (`*`, `PAN-SHORT`, `PAN-AA:..:HH`, `SHORT`, `AA:..:HH`).
    #[arg(long, short = 's', value_name = "ADDR")]
    pub saddr: Option<String>,
    /// Destination address, same syntax as --saddr.
    #[arg(long, short = 'd', value_name = "ADDR")]
    pub daddr: Option<String>,
    /// Load the payload from a file.
    #[arg(long, short = 'p', value_name = "FILE", conflicts_with = "payload_hex")]
    pub payload: Option<PathBuf>,
    /// Payload as hexadecimal text.
    #[arg(long, value_name = "HEX")]
    pub payload_hex: Option<String>,
    /// Sequence number.
    #[arg(long, short = 'S')]
    pub seqno: Option<String>,
    #[arg(long, conflicts_with = "disable_pending")]
    pub enable_pending: bool,
    #[arg(long)]
    pub disable_pending: bool,
    #[arg(long, conflicts_with = "disable_ack")]
    pub enable_ack: bool,
    #[arg(long)]
    pub disable_ack: bool,
    #[arg(long, conflicts_with = "disable_pan_comp")]
    pub enable_pan_comp: bool,
    #[arg(long)]
    pub disable_pan_comp: bool,
    /// Write the encoded frame to a file.
    #[arg(long, value_name = "FILE")]
    pub write_frame: Option<PathBuf>,
    /// Write the payload to a file.
    #[arg(long, value_name = "FILE")]
    pub write_payload: Option<PathBuf>,
    /// Write the encoded header to a file.
    #[arg(long, value_name = "FILE")]
    pub write_header: Option<PathBuf>,
    /// Pad the payload with random bytes up to the largest frame.
    #[arg(long)]
    pub random_payload: bool,
}

#[cfg(unix)]
#[derive(Args, Debug)]
pub struct PingArgs {
    /// Serial device the transceiver is attached to.
    #[arg(env = "WSNLINK_TTY")]
    pub tty: PathBuf,
    #[command(flatten)]
    pub line: LineArgs,
    /// Number of random bytes in each ping (0 to 118).
    #[arg(long, short = 's', default_value_t = 64,
          value_parser = clap::value_parser!(u8).range(0..=MAX_PING_SIZE))]
    pub size: u8,
    /// Stop after sending this many pings.
    #[arg(long, short = 'c', value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,
    /// Wait between pings (e.g. 1s, 200ms).
    #[arg(long, short = 'i', value_name = "DURATION")]
    pub interval: Option<String>,
    /// Print a dot per ping sent and erase it on reply.
    #[arg(long, short = 'f')]
    pub flood: bool,
    /// How long to wait for each reply (e.g. 2s, 500ms).
    #[arg(long, short = 'T', value_name = "DURATION", default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// MAC frame as hexadecimal text. Spaces and colons are ignored.
    pub hex: String,
    /// The frame ends with its 2-byte FCS.
    #[arg(long)]
    pub fcs: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Accept a decimal channel number no larger than [`MAX_CHANNEL`].
pub fn parse_channel(input: &str) -> Result<u16, String> {
    let input = input.trim();
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid channel -- '{input}'"));
    }
    match input.parse::<u16>() {
        Ok(channel) if channel <= MAX_CHANNEL => Ok(channel),
        _ => Err(format!("invalid channel -- '{input}' (max {MAX_CHANNEL})")),
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn parse_optional_duration(input: Option<&str>) -> CliResult<Option<Duration>> {
    input.map(parse_duration).transpose()
}

pub fn channel_queue(channel: Option<u16>) -> ControlQueue {
    let mut queue = ControlQueue::new();
    if let Some(channel) = channel {
        queue.push_channel(channel);
    }
    queue
}

/// Clear the returned flag on Ctrl-C.
pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_decimal_and_bounded() {
        assert_eq!(parse_channel("0"), Ok(0));
        assert_eq!(parse_channel("26"), Ok(26));
        assert!(parse_channel("27").is_err());
        assert!(parse_channel("0x1a").is_err());
        assert!(parse_channel("-1").is_err());
        assert!(parse_channel("").is_err());
        assert!(parse_channel("99999999").is_err());
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn channel_is_queued_first() {
        let queue = channel_queue(Some(11));
        assert_eq!(queue.len(), 1);
        assert!(channel_queue(None).is_empty());
    }
}
