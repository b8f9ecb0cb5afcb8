use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const PCAP_MAJOR: u16 = 2;
const PCAP_MINOR: u16 = 4;
const SNAPLEN: u32 = 0xff;
const LINKTYPE_IEEE802_15_4: u32 = 195;

/// Classic libpcap capture file, little-endian, microsecond timestamps.
pub struct PcapWriter<W: Write> {
    inner: W,
    records: usize,
}

impl PcapWriter<BufWriter<File>> {
    /// Create (or truncate) a capture file and write its global header.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "pcap file created");
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> PcapWriter<W> {
    pub fn new(mut inner: W) -> io::Result<Self> {
        inner.write_all(&PCAP_MAGIC.to_le_bytes())?;
        inner.write_all(&PCAP_MAJOR.to_le_bytes())?;
        inner.write_all(&PCAP_MINOR.to_le_bytes())?;
        inner.write_all(&0i32.to_le_bytes())?; // thiszone
        inner.write_all(&0u32.to_le_bytes())?; // sigfigs
        inner.write_all(&SNAPLEN.to_le_bytes())?;
        inner.write_all(&LINKTYPE_IEEE802_15_4.to_le_bytes())?;
        Ok(Self { inner, records: 0 })
    }

    /// Append one frame stamped with the current time. Empty frames are
    /// skipped.
    pub fn append(&mut self, frame: &[u8]) -> io::Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        self.append_at(frame, now)
    }

    pub fn append_at(&mut self, frame: &[u8], timestamp: Duration) -> io::Result<()> {
        if frame.is_empty() {
            return Ok(());
        }
        let len = frame.len() as u32;
        self.inner.write_all(&(timestamp.as_secs() as u32).to_le_bytes())?;
        self.inner.write_all(&timestamp.subsec_micros().to_le_bytes())?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(frame)?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.inner
    }
}
