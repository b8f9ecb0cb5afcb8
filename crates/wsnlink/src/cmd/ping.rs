use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crc::{Crc, CRC_32_ISO_HDLC};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};
use wsnlink_frame::{ControlMessage, ControlSubtype, Flow, LoopExit};
use wsnlink_session::{preparse_control, MessageHandler, Session, SessionError};

use crate::cmd::{install_ctrlc_handler, parse_duration, parse_optional_duration, PingArgs};
use crate::exit::{session_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_raw, print_table, OutputFormat};

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

const SEQNO_LEN: usize = 4;
const CRC_LEN: usize = 4;

/// Ping control payload: sequence number, filler, then a CRC-32 of both.
/// Integers are little-endian.
pub fn build_ping(seqno: u32, filler: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(SEQNO_LEN + filler.len() + CRC_LEN);
    payload.extend_from_slice(&seqno.to_le_bytes());
    payload.extend_from_slice(filler);
    let crc = CRC32.checksum(&payload);
    payload.extend_from_slice(&crc.to_le_bytes());
    payload
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    BadCrc,
    BadSeqno,
}

impl ReplyStatus {
    fn mark(self) -> char {
        match self {
            Self::Ok => '*',
            Self::BadCrc => 'E',
            Self::BadSeqno => 'e',
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::BadCrc => "crc-mismatch",
            Self::BadSeqno => "seqno-mismatch",
        }
    }

    /// Replaces the dot printed when the ping was sent.
    fn flood_mark(self) -> &'static str {
        match self {
            Self::Ok => "\u{8}",
            Self::BadCrc => "\u{8}E",
            Self::BadSeqno => "\u{8}e",
        }
    }
}

/// Check an echoed ping against the sequence number that was sent.
pub fn check_reply(data: &[u8], expected: u32) -> ReplyStatus {
    if data.len() < SEQNO_LEN + CRC_LEN {
        return ReplyStatus::BadCrc;
    }
    let (body, crc) = data.split_at(data.len() - CRC_LEN);
    let crc = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
    if CRC32.checksum(body) != crc {
        return ReplyStatus::BadCrc;
    }
    let seqno = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    if seqno != expected {
        return ReplyStatus::BadSeqno;
    }
    ReplyStatus::Ok
}

/// Round-trip statistics.
#[derive(Debug, Default)]
pub struct PingStats {
    pub sent: u64,
    pub ok: u64,
    pub error: u64,
    pub lost: u64,
    replies: u64,
    min: Option<Duration>,
    max: Option<Duration>,
    sum_us: u128,
    sq_sum_us: u128,
}

impl PingStats {
    pub fn record(&mut self, status: ReplyStatus, rtt: Duration) {
        match status {
            ReplyStatus::Ok => self.ok += 1,
            ReplyStatus::BadCrc | ReplyStatus::BadSeqno => self.error += 1,
        }
        let us = rtt.as_micros();
        self.replies += 1;
        self.sum_us += us;
        self.sq_sum_us += us * us;
        self.min = Some(self.min.map_or(rtt, |min| min.min(rtt)));
        self.max = Some(self.max.map_or(rtt, |max| max.max(rtt)));
    }

    fn summary(&self, tty: String) -> PingSummary {
        let ms = |d: Duration| d.as_micros() as f64 / 1000.0;
        let (avg, mdev) = if self.replies == 0 {
            (None, None)
        } else {
            let n = self.replies as f64;
            let mean = self.sum_us as f64 / n;
            let variance = (self.sq_sum_us as f64 / n - mean * mean).max(0.0);
            (Some(mean / 1000.0), Some(variance.sqrt() / 1000.0))
        };
        PingSummary {
            tty,
            sent: self.sent,
            ok: self.ok,
            error: self.error,
            lost: self.lost,
            rtt_min_ms: self.min.map(ms),
            rtt_avg_ms: avg,
            rtt_max_ms: self.max.map(ms),
            rtt_mdev_ms: mdev,
        }
    }
}

#[derive(Debug, Serialize)]
struct PingSummary {
    tty: String,
    sent: u64,
    ok: u64,
    error: u64,
    lost: u64,
    rtt_min_ms: Option<f64>,
    rtt_avg_ms: Option<f64>,
    rtt_max_ms: Option<f64>,
    rtt_mdev_ms: Option<f64>,
}

#[derive(Serialize)]
struct PingReply {
    seqno: u32,
    bytes: usize,
    status: &'static str,
    rtt_us: Option<u128>,
}

/// Human-readable duration, scaled like `12 ms`, `1.250 s`, `2.000 minutes`.
pub fn format_rtt(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 86_400 {
        "> 1 day".to_string()
    } else if secs >= 3600 {
        format!("{:.3} hours", secs as f64 / 3600.0)
    } else if secs >= 60 {
        format!("{:.3} minutes", secs as f64 / 60.0)
    } else if secs > 0 {
        format!("{}.{:03} s", secs, d.subsec_millis())
    } else if d.subsec_micros() > 1000 {
        format!("{} ms", d.subsec_millis())
    } else {
        format!("{} us", d.subsec_micros())
    }
}

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let reply_timeout = parse_duration(&args.timeout)?;
    let interval = parse_optional_duration(args.interval.as_deref())?;
    let running = install_ctrlc_handler()?;
    let config = args.line.session_config(Some(reply_timeout))?;

    let mut session = Session::open(&args.tty, &config, Default::default())
        .map_err(|err| session_error("cannot open transceiver", err))?;

    let mut filler = vec![0u8; args.size as usize];
    rand::thread_rng().fill(&mut filler[..]);
    let flood = args.flood && format != OutputFormat::Json;

    let mut stats = PingStats::default();
    let mut seqno: u32 = 0;
    info!(tty = %args.tty.display(), size = args.size, "pinging");

    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| stats.sent >= count) {
            break;
        }

        let payload = build_ping(seqno, &filler);
        let bytes = payload.len() + 2;
        let sent_at = Instant::now();
        session
            .send_control(ControlSubtype::Ping, &payload)
            .map_err(|err| session_error("cannot send ping", err))?;
        stats.sent += 1;
        if flood {
            print_raw(b".");
        }

        let mut waiter = ReplyWaiter::new(seqno, running.clone());
        let exit = session
            .dispatch(&mut waiter)
            .map_err(|err| session_error("ping failed", err))?;
        let rtt = sent_at.elapsed();

        match waiter.reply {
            Some(status) => {
                stats.record(status, rtt);
                if flood {
                    print_raw(status.flood_mark().as_bytes());
                } else if format == OutputFormat::Json {
                    print_json(&PingReply {
                        seqno,
                        bytes,
                        status: status.name(),
                        rtt_us: Some(rtt.as_micros()),
                    });
                } else {
                    println!(
                        "({}) {} bytes: ping_req={} time={}",
                        status.mark(),
                        bytes,
                        seqno,
                        format_rtt(rtt)
                    );
                }
            }
            None if exit == LoopExit::EndOfStream => {
                return Err(session_error(
                    "ping failed",
                    SessionError::Disconnected("line closed".into()),
                ));
            }
            None if exit == LoopExit::TimedOut => {
                stats.lost += 1;
                debug!(seqno, "ping reply timed out");
                if format == OutputFormat::Json {
                    print_json(&PingReply {
                        seqno,
                        bytes,
                        status: "timeout",
                        rtt_us: None,
                    });
                } else if !flood {
                    println!("(-) {bytes} bytes: ping_req={seqno} timeout");
                }
            }
            // Interrupted while waiting.
            None => break,
        }

        seqno = seqno.wrapping_add(1);
        if let Some(interval) = interval {
            sleep_while_running(interval, &running);
        }
    }

    if flood {
        println!();
    }
    let summary = stats.summary(args.tty.display().to_string());
    print_summary(&summary, format);

    if stats.sent > 0 && stats.ok == 0 {
        Ok(FAILURE)
    } else {
        Ok(SUCCESS)
    }
}

fn sleep_while_running(total: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        thread::sleep(left.min(Duration::from_millis(50)));
    }
}

fn print_summary(summary: &PingSummary, format: OutputFormat) {
    let ms = |value: Option<f64>| value.map_or("-".to_string(), |v| format!("{v:.3}"));
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => print_table(&[
            ("tty", summary.tty.clone()),
            ("sent", summary.sent.to_string()),
            ("ok", summary.ok.to_string()),
            ("error", summary.error.to_string()),
            ("lost", summary.lost.to_string()),
            ("rtt min (ms)", ms(summary.rtt_min_ms)),
            ("rtt avg (ms)", ms(summary.rtt_avg_ms)),
            ("rtt max (ms)", ms(summary.rtt_max_ms)),
            ("rtt mdev (ms)", ms(summary.rtt_mdev_ms)),
        ]),
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("--- {} ping statistics ---", summary.tty);
            println!(
                "{} sent, {} ok, {} error, {} lost",
                summary.sent, summary.ok, summary.error, summary.lost
            );
            println!(
                "rtt min/avg/max/mdev = {}/{}/{}/{} ms",
                ms(summary.rtt_min_ms),
                ms(summary.rtt_avg_ms),
                ms(summary.rtt_max_ms),
                ms(summary.rtt_mdev_ms)
            );
        }
    }
}

/// Waits for the PING echo of one request. Frame messages are ignored so a
/// sniffer firmware can be pinged too.
struct ReplyWaiter {
    expected: u32,
    reply: Option<ReplyStatus>,
    running: Arc<AtomicBool>,
}

impl ReplyWaiter {
    fn new(expected: u32, running: Arc<AtomicBool>) -> Self {
        Self {
            expected,
            reply: None,
            running,
        }
    }
}

impl MessageHandler for ReplyWaiter {
    fn on_frame(&mut self, _frame: &[u8]) -> wsnlink_session::Result<Flow> {
        Ok(Flow::Continue)
    }

    fn on_control(&mut self, control: ControlMessage<'_>) -> wsnlink_session::Result<Flow> {
        if preparse_control(&control, &mut std::io::stdout(), &mut std::io::stderr())? {
            return Ok(Flow::Continue);
        }
        if control.subtype() != Some(ControlSubtype::Ping) {
            debug!(subtype = %control.name(), "ignoring control message");
            return Ok(Flow::Continue);
        }
        self.reply = Some(check_reply(control.data, self.expected));
        Ok(Flow::Stop)
    }

    fn on_idle(&mut self) -> wsnlink_session::Result<Flow> {
        if self.running.load(Ordering::SeqCst) {
            Ok(Flow::Continue)
        } else {
            Ok(Flow::Stop)
        }
    }
}
