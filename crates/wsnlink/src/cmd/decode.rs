use wsnlink_mac::{DisplayFlags, MacFrame};

use crate::cmd::DecodeArgs;
use crate::exit::{mac_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, FrameView, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let data = parse_hex(&args.hex)?;
    let frame =
        MacFrame::decode(&data, args.fcs).map_err(|err| mac_error("cannot decode frame", err))?;

    let view = FrameView {
        flags: DisplayFlags::ALL,
        payload: true,
        fcs: args.fcs,
        timestamp: false,
    };
    print_frame(&frame, &data, &view, format);
    Ok(SUCCESS)
}

/// Hex text to bytes. Whitespace, `:` and `-` separators and a leading
/// `0x` are ignored.
fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    if cleaned.is_empty() {
        return Err(CliError::new(USAGE, "empty frame"));
    }
    hex::decode(&cleaned).map_err(|err| CliError::new(USAGE, format!("invalid hex frame: {err}")))
}
