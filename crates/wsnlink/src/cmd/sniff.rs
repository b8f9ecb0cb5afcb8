use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use wsnlink_frame::{ControlMessage, Flow, LoopExit};
use wsnlink_mac::{DisplayFlags, MacFrame};
use wsnlink_session::{preparse_control, MessageHandler, Session, SessionError};

use crate::cmd::{channel_queue, install_ctrlc_handler, parse_optional_duration, SniffArgs};
use crate::exit::{io_error, session_error, CliResult, SUCCESS};
use crate::output::{print_frame, FrameView, OutputFormat, Spinner};
use crate::pcap::PcapWriter;

pub fn run(args: SniffArgs, format: OutputFormat) -> CliResult<i32> {
    let view = frame_view(&args);
    if args.pcap.is_none() && !view.flags.any() && !view.payload {
        warn!("doing nothing as requested");
    }

    let pcap = match &args.pcap {
        Some(path) => Some(PcapWriter::create(path).map_err(|err| {
            io_error(&format!("cannot open pcap file {}", path.display()), err)
        })?),
        None => None,
    };

    let running = install_ctrlc_handler()?;
    let timeout = parse_optional_duration(args.timeout.as_deref())?;
    let config = args.line.session_config(timeout)?;

    let mut session = Session::open(&args.tty, &config, channel_queue(args.channel))
        .map_err(|err| session_error("cannot open transceiver", err))?;
    info!(tty = %args.tty.display(), "sniffing");

    let mut sniffer = Sniffer {
        view,
        format,
        pcap,
        running,
        spinner: Spinner::new("Waiting", format),
        captured: 0,
    };
    let result = session.dispatch(&mut sniffer);
    sniffer.spinner.clear();

    if let Some(pcap) = sniffer.pcap.as_mut() {
        pcap.flush()
            .map_err(|err| io_error("cannot write to pcap file", err))?;
        debug!(records = pcap.records(), "pcap file flushed");
    }

    let exit = result.map_err(|err| session_error("sniffing failed", err))?;
    match exit {
        LoopExit::TimedOut => info!(frames = sniffer.captured, "no input before timeout"),
        LoopExit::EndOfStream => warn!(frames = sniffer.captured, "transceiver closed the line"),
        _ => debug!(frames = sniffer.captured, "capture stopped"),
    }
    Ok(SUCCESS)
}

fn frame_view(args: &SniffArgs) -> FrameView {
    let flags = if args.show_all || args.show_mac {
        DisplayFlags::ALL
    } else {
        DisplayFlags {
            control: args.show_control,
            seqno: args.show_seqno,
            addr: args.show_addr,
            security: args.show_security,
        }
    };
    FrameView {
        flags,
        payload: args.show_payload || args.show_all,
        fcs: false,
        timestamp: true,
    }
}

struct Sniffer {
    view: FrameView,
    format: OutputFormat,
    pcap: Option<PcapWriter<BufWriter<File>>>,
    running: Arc<AtomicBool>,
    spinner: Spinner,
    captured: usize,
}

impl Sniffer {
    fn flow(&self) -> Flow {
        if self.running.load(Ordering::SeqCst) {
            Flow::Continue
        } else {
            Flow::Stop
        }
    }
}

impl MessageHandler for Sniffer {
    fn on_frame(&mut self, data: &[u8]) -> wsnlink_session::Result<Flow> {
        self.spinner.clear();

        // The firmware forwards frames as received, checksum included.
        let frame = match MacFrame::decode(data, true) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(frame = %hex::encode(data), "undecodable frame");
                warn!(error = %err, "cannot decode frame");
                return Ok(self.flow());
            }
        };

        print_frame(&frame, data, &self.view, self.format);
        if let Some(pcap) = self.pcap.as_mut() {
            pcap.append(data)?;
        }
        self.captured += 1;
        Ok(self.flow())
    }

    fn on_control(&mut self, control: ControlMessage<'_>) -> wsnlink_session::Result<Flow> {
        self.spinner.clear();
        let consumed = preparse_control(&control, &mut std::io::stdout(), &mut std::io::stderr())?;
        if !consumed {
            return Err(SessionError::UnexpectedMessage(format!(
                "unmanaged control message {}",
                control.name()
            )));
        }
        Ok(self.flow())
    }

    fn on_idle(&mut self) -> wsnlink_session::Result<Flow> {
        self.spinner.tick();
        Ok(self.flow())
    }
}
