use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use wsnlink_mac::{DisplayFlags, MacFrame};

use crate::hexdump::hex_dump;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }

    /// Whether the format is meant for a human watching a terminal.
    pub fn is_interactive(self) -> bool {
        matches!(self, Self::Table | Self::Pretty)
    }
}

/// Which parts of a frame to show.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameView {
    pub flags: DisplayFlags,
    pub payload: bool,
    pub fcs: bool,
    pub timestamp: bool,
}

#[derive(Serialize)]
struct ControlReport {
    raw: String,
    version: String,
    frame_type: String,
    security: bool,
    pending: bool,
    ack_request: bool,
    pan_compression: bool,
    dam: &'static str,
    sam: &'static str,
    reserved: u8,
}

#[derive(Serialize)]
struct FrameReport {
    frame_type: &'static str,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    control: Option<ControlReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seqno: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fcs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl FrameReport {
    fn new(frame: &MacFrame, size: usize, view: &FrameView) -> Self {
        let fc = frame.control;
        let control = view.flags.control.then(|| ControlReport {
            raw: format!("0x{:04x}", fc.bits()),
            version: fc.mac_version().to_string(),
            frame_type: fc.frame_type().to_string(),
            security: fc.security_enabled(),
            pending: fc.frame_pending(),
            ack_request: fc.ack_request(),
            pan_compression: fc.pan_id_compression(),
            dam: fc.dst_addr_mode().name(),
            sam: fc.src_addr_mode().name(),
            reserved: fc.reserved(),
        });

        Self {
            frame_type: frame.frame_type().name(),
            size,
            control,
            seqno: view.flags.seqno.then_some(frame.seqno),
            src: view
                .flags
                .addr
                .then(|| frame.src.display(fc.src_addr_mode()).to_string()),
            dst: view
                .flags
                .addr
                .then(|| frame.dst.display(fc.dst_addr_mode()).to_string()),
            fcs: view.fcs.then(|| format!("0x{:04x}", frame.fcs)),
            payload: match &frame.payload {
                Some(payload) if view.payload => Some(hex::encode(payload)),
                _ => None,
            },
            timestamp: view.timestamp.then(now_unix_seconds),
        }
    }

    fn rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("type".to_string(), self.frame_type.to_string()),
            ("size".to_string(), self.size.to_string()),
        ];
        if let Some(control) = &self.control {
            rows.push(("control".into(), control.raw.clone()));
            rows.push(("version".into(), control.version.clone()));
            rows.push(("security".into(), yes_no(control.security).into()));
            rows.push(("pending".into(), yes_no(control.pending).into()));
            rows.push(("ack request".into(), yes_no(control.ack_request).into()));
            rows.push(("pan comp.".into(), yes_no(control.pan_compression).into()));
            rows.push(("dam".into(), control.dam.into()));
            rows.push(("sam".into(), control.sam.into()));
            if control.reserved != 0 {
                rows.push(("reserved".into(), format!("0x{:x}", control.reserved)));
            }
        }
        let optional = [
            ("seqno", self.seqno.map(|seqno| seqno.to_string())),
            ("src", self.src.clone()),
            ("dst", self.dst.clone()),
            ("fcs", self.fcs.clone()),
            ("payload", self.payload.clone()),
            ("timestamp", self.timestamp.clone()),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                rows.push((name.to_string(), value));
            }
        }
        rows
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Render a decoded frame. `raw` is the frame as received, used for the
/// raw format and the reported size.
pub fn render_frame(
    frame: &MacFrame,
    raw: &[u8],
    view: &FrameView,
    format: OutputFormat,
) -> Vec<u8> {
    match format {
        OutputFormat::Json => {
            let report = FrameReport::new(frame, raw.len(), view);
            let mut line = serde_json::to_vec(&report).unwrap_or_else(|_| b"{}".to_vec());
            line.push(b'\n');
            line
        }
        OutputFormat::Table => {
            let report = FrameReport::new(frame, raw.len(), view);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in report.rows() {
                table.add_row(vec![field, value]);
            }
            format!("{table}\n").into_bytes()
        }
        OutputFormat::Pretty => {
            let mut text = frame.display(view.flags).to_string();
            if let (true, Some(payload)) = (view.payload, &frame.payload) {
                text.push_str("Payload:\n");
                text.push_str(&hex_dump(payload));
            }
            text.push('\n');
            text.into_bytes()
        }
        OutputFormat::Raw => raw.to_vec(),
    }
}

pub fn print_frame(frame: &MacFrame, raw: &[u8], view: &FrameView, format: OutputFormat) {
    print_raw(&render_frame(frame, raw, view, format));
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// A two-column table of name/value pairs.
pub fn print_table(rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value.clone()]);
    }
    println!("{table}");
}

/// A `Message [/]` line redrawn in place while waiting for input.
pub struct Spinner {
    message: Option<&'static str>,
    tick: usize,
}

impl Spinner {
    const FRAMES: [char; 4] = ['/', '-', '\\', '|'];

    /// A spinner that only draws when stdout is a terminal showing a
    /// human-oriented format.
    pub fn new(message: &'static str, format: OutputFormat) -> Self {
        let visible = format.is_interactive() && std::io::stdout().is_terminal();
        Self {
            message: visible.then_some(message),
            tick: 0,
        }
    }

    #[cfg(test)]
    pub fn hidden() -> Self {
        Self {
            message: None,
            tick: 0,
        }
    }

    pub fn tick(&mut self) {
        if let Some(message) = self.message {
            let frame = Self::FRAMES[self.tick % Self::FRAMES.len()];
            self.tick = self.tick.wrapping_add(1);
            print_raw(format!("{message} [{frame}]\r").as_bytes());
        }
    }

    pub fn clear(&self) {
        if let Some(message) = self.message {
            let blank = " ".repeat(message.len() + 4);
            print_raw(format!("{blank}\r").as_bytes());
        }
    }
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| format!("{}.{:06}", d.as_secs(), d.subsec_micros()))
        .unwrap_or_else(|_| "0".to_string())
}
