use std::fs;
use std::path::Path;

use rand::Rng;
use tracing::{debug, info, warn};
use wsnlink_mac::parse::{
    apply_flags, parse_addr_mode, parse_address, parse_frame_type, parse_mac_version,
    parse_reserved, parse_seqno,
};
use wsnlink_mac::{encode_header, DisplayFlags, MacFrame, MAX_FRAME_SIZE};

use crate::cmd::InjectArgs;
use crate::exit::{
    io_error, mac_error, parse_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE,
};
use crate::output::{print_frame, FrameView, OutputFormat};

pub fn run(args: InjectArgs, format: OutputFormat) -> CliResult<i32> {
    let mut frame = build_frame(&args)?;
    let mut encoded = frame
        .to_bytes()
        .map_err(|err| mac_error("cannot encode frame", err))?;

    if args.random_payload {
        pad_with_random(&mut frame, MAX_FRAME_SIZE - encoded.len());
        encoded = frame
            .to_bytes()
            .map_err(|err| mac_error("cannot encode frame", err))?;
    }
    debug!(size = encoded.len(), frame = %hex::encode(&encoded), "frame encoded");

    if args.display {
        let view = FrameView {
            flags: DisplayFlags::ALL,
            payload: true,
            ..FrameView::default()
        };
        print_frame(&frame, &encoded, &view, format);
    }

    if let Some(path) = &args.write_frame {
        write_to_file(path, "frame", &encoded)?;
    }
    if let Some(path) = &args.write_payload {
        write_to_file(path, "payload", frame.payload())?;
    }
    if let Some(path) = &args.write_header {
        let mut header = Vec::with_capacity(frame.header_len());
        encode_header(&frame, &mut header).map_err(|err| mac_error("cannot encode header", err))?;
        write_to_file(path, "header", &header)?;
    }

    if args.dry_run {
        return Ok(SUCCESS);
    }

    #[cfg(unix)]
    {
        send::run(&args, &encoded, frame.control.ack_request())
    }
    #[cfg(not(unix))]
    {
        Err(CliError::new(USAGE, "sending requires a unix serial line"))
    }
}

/// Apply the command-line options to the default frame.
///
/// Options are applied in a fixed order: base frame file, type, version,
/// reserved bits, addresses, forced address modes, flag list, individual
/// flags, sequence number, payload.
pub fn build_frame(args: &InjectArgs) -> CliResult<MacFrame> {
    let mut frame = match &args.frame {
        Some(path) => load_frame(path)?,
        None => MacFrame::default(),
    };

    if let Some(value) = &args.frame_type {
        let frame_type = parse_frame_type(&value.to_lowercase()).map_err(parse_error)?;
        frame.control.set_frame_type(frame_type);
    }
    if let Some(value) = &args.mac_version {
        let version = parse_mac_version(&value.to_lowercase()).map_err(parse_error)?;
        frame.control.set_mac_version(version);
    }
    if let Some(value) = &args.reserved {
        frame.control.set_reserved(parse_reserved(value).map_err(parse_error)?);
    }

    if let Some(value) = &args.saddr {
        frame.set_source(parse_address(value).map_err(parse_error)?);
    }
    if let Some(value) = &args.daddr {
        if !frame.set_destination(parse_address(value).map_err(parse_error)?) {
            warn!(address = %value, "no PAN ID for destination address");
        }
    }
    if let Some(value) = &args.sam {
        let mode = parse_addr_mode(&value.to_lowercase()).map_err(parse_error)?;
        frame.control.set_src_addr_mode(mode);
    }
    if let Some(value) = &args.dam {
        let mode = parse_addr_mode(&value.to_lowercase()).map_err(parse_error)?;
        frame.control.set_dst_addr_mode(mode);
    }

    if let Some(list) = &args.flags {
        apply_flags(&mut frame.control, list).map_err(parse_error)?;
    }
    let toggles = [
        (args.enable_pending, args.disable_pending, "pending"),
        (args.enable_ack, args.disable_ack, "ack"),
        (args.enable_pan_comp, args.disable_pan_comp, "pan-comp"),
    ];
    for (enable, disable, name) in toggles {
        if enable {
            apply_flags(&mut frame.control, name).map_err(parse_error)?;
        }
        if disable {
            apply_flags(&mut frame.control, &format!("-{name}")).map_err(parse_error)?;
        }
    }

    if let Some(value) = &args.seqno {
        frame.seqno = parse_seqno(value).map_err(parse_error)?;
    }

    if let Some(path) = &args.payload {
        let payload = fs::read(path).map_err(|err| {
            io_error(&format!("cannot read payload {}", path.display()), err)
        })?;
        frame.set_payload(payload);
    } else if let Some(text) = &args.payload_hex {
        let cleaned: String = text.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
        let payload = hex::decode(&cleaned)
            .map_err(|err| CliError::new(USAGE, format!("invalid payload hex: {err}")))?;
        frame.set_payload(payload);
    }

    Ok(frame)
}

fn load_frame(path: &Path) -> CliResult<MacFrame> {
    let data = fs::read(path)
        .map_err(|err| io_error(&format!("cannot read frame {}", path.display()), err))?;
    MacFrame::decode(&data, false).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("cannot decode frame {}: {err}", path.display()),
        )
    })
}

fn pad_with_random(frame: &mut MacFrame, extra: usize) {
    if extra == 0 {
        return;
    }
    let mut payload = frame.payload().to_vec();
    let start = payload.len();
    payload.resize(start + extra, 0);
    rand::thread_rng().fill(&mut payload[start..]);
    frame.set_payload(payload);
}

fn write_to_file(path: &Path, what: &str, data: &[u8]) -> CliResult<()> {
    fs::write(path, data).map_err(|err| {
        io_error(&format!("cannot write {what} to {}", path.display()), err)
    })?;
    info!(path = %path.display(), size = data.len(), "{what} written");
    Ok(())
}

#[cfg(unix)]
mod send {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tracing::{info, warn};
    use wsnlink_frame::{ControlMessage, ControlSubtype, Flow, LoopExit};
    use wsnlink_session::{preparse_control, MessageHandler, Session, SessionError};

    use crate::cmd::{channel_queue, install_ctrlc_handler, parse_optional_duration, InjectArgs};
    use crate::exit::{session_error, CliError, CliResult, FAILURE, SUCCESS};

    pub fn run(args: &InjectArgs, encoded: &[u8], ack: bool) -> CliResult<i32> {
        let Some(tty) = &args.tty else {
            return Err(CliError::new(crate::exit::USAGE, "expected a tty device"));
        };
        let running = install_ctrlc_handler()?;
        let timeout = parse_optional_duration(args.timeout.as_deref())?;
        let config = args.line.session_config(timeout)?;

        let mut session = Session::open(tty, &config, channel_queue(args.channel))
            .map_err(|err| session_error("cannot open transceiver", err))?;
        session
            .send_frame(encoded)
            .map_err(|err| session_error("cannot send frame", err))?;
        info!(size = encoded.len(), ack, "frame sent");

        let mut injector = Injector::new(ack, running);
        let exit = session
            .dispatch(&mut injector)
            .map_err(|err| session_error("injection failed", err))?;

        match exit {
            LoopExit::CompletedWithPending => warn!("there are messages left on the buffer"),
            LoopExit::TimedOut if ack => warn!("ACK reception has timed out"),
            LoopExit::TimedOut => warn!("Processing confirmation has timed out"),
            LoopExit::EndOfStream => {
                return Err(CliError::new(FAILURE, "transceiver closed the line"));
            }
            LoopExit::Completed => {}
        }
        Ok(SUCCESS)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) enum State {
        WaitingOk,
        WaitingAck,
    }

    /// Waits for the firmware's OK, then for the radio ACK when one was
    /// requested.
    pub(super) struct Injector {
        ack: bool,
        pub(super) state: State,
        running: Arc<AtomicBool>,
    }

    impl Injector {
        pub(super) fn new(ack: bool, running: Arc<AtomicBool>) -> Self {
            Self {
                ack,
                state: State::WaitingOk,
                running,
            }
        }

        fn on_ok(&mut self) -> wsnlink_session::Result<Flow> {
            if self.state != State::WaitingOk {
                return Err(SessionError::UnexpectedMessage("unexpected OK".into()));
            }
            if self.ack {
                self.state = State::WaitingAck;
                Ok(Flow::Continue)
            } else {
                Ok(Flow::Stop)
            }
        }

        fn on_ack(&mut self) -> wsnlink_session::Result<Flow> {
            if !self.ack || self.state != State::WaitingAck {
                return Err(SessionError::UnexpectedMessage("unexpected ACK".into()));
            }
            Ok(Flow::Stop)
        }
    }

    impl MessageHandler for Injector {
        fn on_frame(&mut self, _frame: &[u8]) -> wsnlink_session::Result<Flow> {
            Err(SessionError::UnexpectedMessage(
                "frame message: is this an injector firmware?".into(),
            ))
        }

        fn on_control(&mut self, control: ControlMessage<'_>) -> wsnlink_session::Result<Flow> {
            if preparse_control(&control, &mut std::io::stdout(), &mut std::io::stderr())? {
                return Ok(Flow::Continue);
            }
            match control.subtype() {
                Some(ControlSubtype::Ok) => self.on_ok(),
                Some(ControlSubtype::Ack) => self.on_ack(),
                _ => Err(SessionError::UnexpectedMessage(format!(
                    "unmanaged control message {}",
                    control.name()
                ))),
            }
        }

        fn on_idle(&mut self) -> wsnlink_session::Result<Flow> {
            if self.running.load(Ordering::SeqCst) {
                Ok(Flow::Continue)
            } else {
                Ok(Flow::Stop)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use wsnlink_mac::{AddrMode, FrameType, MacAddr, MacVersion};

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: InjectArgs,
    }

    fn args(extra: &[&str]) -> InjectArgs {
        let argv = ["inject", "--dry-run"].iter().chain(extra.iter());
        Harness::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn defaults_build_a_broadcast_data_frame() {
        let frame = build_frame(&args(&[])).unwrap();
        assert_eq!(frame, MacFrame::default());
        assert_eq!(frame.to_bytes().unwrap(), vec![0x01, 0x00, 0x00]);
    }

    #[test]
    fn options_are_applied() {
        let frame = build_frame(&args(&[
            "--type",
            "CMD",
            "--mac-version",
            "current",
            "--saddr",
            "0002",
            "--daddr",
            "1234-0001",
            "--seqno",
            "0x10",
            "--flags",
            "ack,pending",
            "--disable-pending",
            "--payload-hex",
            "de:ad be ef",
        ]))
        .unwrap();

        assert_eq!(frame.frame_type(), FrameType::Command);
        assert_eq!(frame.control.mac_version(), MacVersion::Current);
        assert_eq!(frame.control.src_addr_mode(), AddrMode::Short);
        assert!(frame.control.pan_id_compression());
        assert_eq!(frame.dst, MacAddr::new(0x1234, 1));
        assert!(frame.control.ack_request());
        assert!(!frame.control.frame_pending());
        assert_eq!(frame.seqno, 0x10);
        assert_eq!(frame.payload(), &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn forced_modes_override_parsed_addresses() {
        let frame = build_frame(&args(&["--daddr", "1234-0001", "--dam", "long"])).unwrap();
        assert_eq!(frame.control.dst_addr_mode(), AddrMode::Long);
    }

    #[test]
    fn bad_values_are_usage_errors() {
        let err = build_frame(&args(&["--type", "bogus"])).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("bogus"));

        let err = build_frame(&args(&["--payload-hex", "abc"])).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn random_padding_fills_the_frame() {
        let mut frame = MacFrame::default();
        frame.set_payload(vec![1, 2, 3]);
        let header = frame.header_len();
        pad_with_random(&mut frame, MAX_FRAME_SIZE - header - 3);

        assert_eq!(&frame.payload()[..3], &[1, 2, 3]);
        assert_eq!(frame.to_bytes().unwrap().len(), MAX_FRAME_SIZE);
    }

    #[test]
    fn tty_is_required_without_dry_run() {
        assert!(Harness::try_parse_from(["inject"]).is_err());
        assert!(Harness::try_parse_from(["inject", "/dev/ttyUSB0"]).is_ok());
    }

    #[cfg(unix)]
    mod injector {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        use wsnlink_frame::{ControlMessage, Flow};
        use wsnlink_session::{MessageHandler, SessionError};

        use super::super::send::{Injector, State};

        fn control(bytes: &[u8]) -> ControlMessage<'_> {
            ControlMessage::parse(bytes).unwrap()
        }

        #[test]
        fn ok_ends_without_ack() {
            let mut injector = Injector::new(false, Arc::new(AtomicBool::new(true)));
            assert_eq!(injector.on_control(control(&[0x02])).unwrap(), Flow::Stop);
        }

        #[test]
        fn ok_then_ack() {
            let mut injector = Injector::new(true, Arc::new(AtomicBool::new(true)));
            assert_eq!(injector.on_control(control(&[0x02])).unwrap(), Flow::Continue);
            assert_eq!(injector.state, State::WaitingAck);
            assert_eq!(injector.on_control(control(&[0x06])).unwrap(), Flow::Stop);
        }

        #[test]
        fn out_of_order_replies_are_fatal() {
            let mut injector = Injector::new(true, Arc::new(AtomicBool::new(true)));
            assert!(matches!(
                injector.on_control(control(&[0x06])),
                Err(SessionError::UnexpectedMessage(_))
            ));

            let mut injector = Injector::new(false, Arc::new(AtomicBool::new(true)));
            assert!(injector.on_frame(&[0x01, 0x00, 0x00]).is_err());
            assert!(injector.on_control(control(&[0x05])).is_err());
        }
    }
}
