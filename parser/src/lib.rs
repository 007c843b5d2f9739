//! This crate provides a streaming reader for das2 and das3 telemetry
//! streams: a self-describing sequence of interleaved XML header packets
//! and opaque binary data packets.
//!
//! The entry point is [`PacketReader`], an iterator over the packets of a
//! byte source. It detects the framing style of the stream from its first
//! bytes, tokenizes both the legacy fixed-tag framing of version 2.2 and
//! the pipe-delimited variable-tag framing of version 3.0, and learns the
//! implicit size of legacy data packets from the data headers that
//! precede them.
//!
//! ```no_run
//! use das2_parser::{Packet, PacketReader};
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = File::open("waveform.d2s")?;
//! for packet in PacketReader::new(file)? {
//!     match packet? {
//!         Packet::Header(hdr) => println!("header {}", hdr.tag()),
//!         Packet::DataHeader(hdr) => println!("data header id {}", hdr.id()),
//!         Packet::Data(data) => println!("{} bytes of data", data.length()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
pub mod datalen;
pub mod packet;
pub mod read;
pub mod xml;

pub use packet::{DataHeaderPacket, DataPacket, HeaderPacket, Packet};
pub use read::{PacketReader, ReaderOptions};
