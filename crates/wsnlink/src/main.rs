mod cmd;
mod exit;
mod hexdump;
mod logging;
mod output;
#[cfg(unix)]
mod pcap;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "wsnlink",
    version,
    about = "Sniff, inject and ping through an IEEE 802.15.4 transceiver"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn parses_sniff_subcommand() {
        let cli = Cli::try_parse_from([
            "wsnlink",
            "sniff",
            "/dev/ttyUSB0",
            "--channel",
            "11",
            "-cs",
            "--pcap",
            "/tmp/capture.pcap",
        ])
        .expect("sniff args should parse");

        match cli.command {
            Command::Sniff(args) => {
                assert_eq!(args.channel, Some(11));
                assert!(args.show_control && args.show_seqno);
                assert!(!args.show_addr);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_channel() {
        let err = Cli::try_parse_from(["wsnlink", "sniff", "/dev/ttyUSB0", "--channel", "27"])
            .expect_err("channel 27 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "wsnlink",
            "inject",
            "--dry-run",
            "--payload",
            "payload.bin",
            "--payload-hex",
            "aabb",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_oversized_ping() {
        let err = Cli::try_parse_from(["wsnlink", "ping", "/dev/ttyUSB0", "--size", "119"])
            .expect_err("size 119 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn flag_list_may_start_with_a_dash() {
        let cli = Cli::try_parse_from(["wsnlink", "inject", "--dry-run", "--flags", "-p,+a"])
            .expect("flag list should parse");
        match cli.command {
            Command::Inject(args) => assert_eq!(args.flags.as_deref(), Some("-p,+a")),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
