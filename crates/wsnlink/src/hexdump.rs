use std::fmt::Write;

const WORD: usize = 8;
const LINE: usize = WORD * 2;

/// Render `data` as offset, two groups of eight hex bytes and the printable
/// characters, sixteen bytes per line.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(LINE) * 76);

    for (index, chunk) in data.chunks(LINE).enumerate() {
        let _ = write!(out, "${:04x}: ", index * LINE);

        for i in 0..LINE {
            if i == WORD {
                out.push(' ');
            }
            match chunk.get(i) {
                Some(byte) => {
                    let _ = write!(out, "{byte:02x} ");
                }
                None => out.push_str("   "),
            }
        }

        out.push('|');
        for i in 0..LINE {
            out.push(match chunk.get(i) {
                Some(byte) if byte.is_ascii_graphic() || *byte == b' ' => *byte as char,
                Some(_) => '.',
                None => ' ',
            });
        }
        out.push_str("|\n");
    }
    out
}
