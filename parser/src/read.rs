//! This module contains the streaming packet reader.
//!
//! The reader pulls bytes from a source and yields typed packets. It
//! handles both framing styles: the fixed-width bracket/colon tags of
//! version 2.2 and the pipe-delimited variable tags of version 3.0.
//! Legacy data frames carry no length of their own, so the reader parses
//! each data header as it is emitted and keeps the derived sizes in a
//! per-stream-id table for framing the data packets that follow.
use crate::datalen;
use crate::packet::{DataHeaderPacket, DataPacket, HeaderPacket, Packet};
use crate::xml;
use das2_core::stream::{StreamKind, StreamType, StreamVersion};
use das2_core::tag::PacketTag;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::collections::HashMap;
use std::io::Read;

/// How many bytes are inspected up front to classify the stream.
const DETECTION_PEEK: usize = 80;

/// Sanity limit for the accumulated variable tag, separators included.
/// No protocol document fixes this; the value is empirical.
const TAG_SANITY_LIMIT: usize = 38;

/// The number of stream-ids addressable by legacy fixed framing.
const LEGACY_IDS: usize = 100;

/// An error produced while reading a stream.
///
/// Every variant carries the byte offset at which the problem was
/// detected. All errors are fatal to the iteration; a failed reader is
/// not resumable.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The byte source failed.
    #[snafu(display("Could not read from the byte source at offset {}", offset))]
    ReadSource {
        offset: u64,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    /// The frame opening is not recognizable in any supported framing.
    #[snafu(display("Unrecognized packet framing `{}` at offset {}", tag, offset))]
    BadFraming {
        tag: String,
        offset: u64,
        backtrace: Backtrace,
    },
    /// The input does not open with a legacy stream header.
    #[snafu(display("Input does not start with `[00]`, this is not a das2 stream"))]
    NotDasStream { backtrace: Backtrace },
    /// A packet ID field is not a non-negative decimal number.
    #[snafu(display("Invalid packet ID `{}` at offset {}", id, offset))]
    BadId {
        id: String,
        offset: u64,
        backtrace: Backtrace,
    },
    /// A length field is not a decimal number.
    #[snafu(display(
        "Invalid length `{}` for packet `{}` at offset {}",
        length,
        tag,
        offset
    ))]
    BadLength {
        length: String,
        tag: String,
        offset: u64,
        backtrace: Backtrace,
    },
    /// A legacy header declares a body below the minimum length.
    #[snafu(display(
        "Header length {} is too short for packet `{}` at offset {}",
        length,
        tag,
        offset
    ))]
    ShortHeader {
        length: usize,
        tag: String,
        offset: u64,
        backtrace: Backtrace,
    },
    /// A variable-tag packet declares a body below the minimum length.
    #[snafu(display("Invalid packet length {} bytes at offset {}", length, offset))]
    ShortPacket {
        length: usize,
        offset: u64,
        backtrace: Backtrace,
    },
    /// A data packet is smaller than the minimum derived from its header.
    #[snafu(display(
        "Short data packet: expected {} bytes but found {} for ID {} at offset {}",
        expected,
        found,
        id,
        offset
    ))]
    ShortDataPacket {
        expected: usize,
        found: usize,
        id: usize,
        offset: u64,
        backtrace: Backtrace,
    },
    /// A legacy data frame appeared before the header describing it.
    #[snafu(display("Undefined data packet ID {} encountered at offset {}", id, offset))]
    UndefinedDataPacket {
        id: usize,
        offset: u64,
        backtrace: Backtrace,
    },
    /// A data header was seen but never resolved to a length.
    #[snafu(display("Unknown data length for packet ID {} at offset {}", id, offset))]
    SizeUnknown {
        id: usize,
        offset: u64,
        backtrace: Backtrace,
    },
    /// The source ended in the middle of a legacy header frame.
    #[snafu(display("Premature end of header `{}` at offset {}", tag, offset))]
    TruncatedHeader {
        tag: String,
        offset: u64,
        backtrace: Backtrace,
    },
    /// The source ended in the middle of a legacy data frame.
    #[snafu(display("Premature end of data for packet ID {} at offset {}", id, offset))]
    TruncatedData {
        id: usize,
        offset: u64,
        backtrace: Backtrace,
    },
    /// The source ended in the middle of a variable-tag frame.
    #[snafu(display("Premature end of packet `{}` ID {} at offset {}", tag, id, offset))]
    TruncatedPacket {
        tag: String,
        id: usize,
        offset: u64,
        backtrace: Backtrace,
    },
    /// A header body or packet tag is not text.
    #[snafu(display("Packet `{}` is not valid UTF-8 text at offset {}", tag, offset))]
    BadUtf8 {
        tag: String,
        offset: u64,
        source: std::str::Utf8Error,
        backtrace: Backtrace,
    },
    /// A variable tag ran past the sanity limit without closing.
    #[snafu(display(
        "Sanity limit of {} bytes exceeded for packet tag `{}` at offset {}",
        TAG_SANITY_LIMIT,
        tag,
        offset
    ))]
    TagTooLong {
        tag: String,
        offset: u64,
        backtrace: Backtrace,
    },
    /// A data header body could not be parsed.
    #[snafu(display("Could not read the data header for packet ID {} at offset {}", id, offset))]
    InvalidDataHeader {
        id: usize,
        offset: u64,
        #[snafu(backtrace)]
        source: xml::Error,
    },
    /// A data header body does not yield a usable data length.
    #[snafu(display(
        "Could not derive the data length for packet ID {} at offset {}",
        id,
        offset
    ))]
    DeriveDataLength {
        id: usize,
        offset: u64,
        #[snafu(backtrace)]
        source: datalen::Error,
    },
}

/// Type alias for a result from this module.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Options for building a [`PacketReader`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    strict: bool,
}

impl ReaderOptions {
    /// Create the default option set.
    pub fn new() -> Self {
        ReaderOptions::default()
    }

    /// In strict mode, legacy fixed-tag frames are rejected when the
    /// detected stream version is 3.0, and a data header missing a
    /// required attribute fails at
    /// [`DataHeaderPacket::base_data_len`](crate::packet::DataHeaderPacket::base_data_len)
    /// instead of leaving the omission for schema validation.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// A streaming reader yielding the packets of a das2 or das3 stream.
///
/// The reader is bound to one byte source, iterated until exhaustion or
/// error, then discarded. Packets are yielded in wire order; the reader
/// retains no reference to a packet once yielded.
#[derive(Debug)]
pub struct PacketReader<S> {
    source: S,
    /// bytes taken up front for stream detection, replayed before the source
    peeked: Vec<u8>,
    /// how much of the peek buffer was consumed again
    peek_cursor: usize,
    /// expected data size per stream-id, learned from data headers
    size_table: HashMap<usize, usize>,
    /// stream-ids with a seen data header (legacy framing only)
    defined: [bool; LEGACY_IDS],
    /// total bytes consumed from the stream
    offset: u64,
    stream_type: StreamType,
    strict: bool,
    /// fuse the iteration process if true
    hard_break: bool,
}

impl<S> PacketReader<S>
where
    S: Read,
{
    /// Create a reader over the given byte source with default options.
    ///
    /// Up to 80 bytes are read immediately to classify the stream; they
    /// are replayed before the rest of the source during iteration.
    pub fn new(source: S) -> Result<Self> {
        PacketReader::with_options(source, ReaderOptions::default())
    }

    /// Create a reader over the given byte source.
    pub fn with_options(mut source: S, options: ReaderOptions) -> Result<Self> {
        let mut peeked = vec![0; DETECTION_PEEK];
        let mut filled = 0;
        while filled < peeked.len() {
            let n = source
                .read(&mut peeked[filled..])
                .context(ReadSourceSnafu {
                    offset: filled as u64,
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        peeked.truncate(filled);
        let stream_type = detect_stream_type(&peeked);

        Ok(PacketReader {
            source,
            peeked,
            peek_cursor: 0,
            size_table: HashMap::new(),
            defined: [false; LEGACY_IDS],
            offset: 0,
            stream_type,
            strict: options.strict,
            hard_break: false,
        })
    }

    /// The stream identity detected from the first bytes of the source.
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// The total number of bytes consumed from the stream so far.
    pub fn bytes_read(&self) -> u64 {
        self.offset
    }

    /// Read up to `n` bytes, draining the detection peek before touching
    /// the source. A shorter return means end of stream.
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = vec![0; n];
        let mut filled = 0;

        let replay = &self.peeked[self.peek_cursor..];
        if !replay.is_empty() {
            let take = replay.len().min(n);
            out[..take].copy_from_slice(&replay[..take]);
            self.peek_cursor += take;
            filled = take;
        }
        while filled < n {
            let got = self
                .source
                .read(&mut out[filled..])
                .context(ReadSourceSnafu { offset: self.offset })?;
            if got == 0 {
                break;
            }
            filled += got;
        }
        out.truncate(filled);
        Ok(out)
    }

    /// Record the outcome of a data length derivation for a stream-id.
    fn learn_data_size(&mut self, id: usize, size: Option<usize>) {
        match size {
            Some(n) => {
                self.size_table.insert(id, n);
            }
            None => {
                tracing::warn!(
                    "data header for packet ID {} does not resolve to a length",
                    id
                );
                self.size_table.remove(&id);
            }
        }
    }

    fn next_fixed_tag(&mut self, probe: &[u8], frame_start: u64) -> Result<Packet> {
        // the very first frame must open a legacy stream header
        if frame_start == 0 && probe != b"[00]" {
            return NotDasStreamSnafu.fail();
        }
        match (probe[0], probe[3]) {
            (b'[', b']') => self.read_fixed_header(probe, frame_start),
            (b':', b':') => self.read_fixed_data(probe, frame_start),
            _ => BadFramingSnafu {
                tag: lossy(probe),
                offset: frame_start,
            }
            .fail(),
        }
    }

    fn read_fixed_header(&mut self, probe: &[u8], frame_start: u64) -> Result<Packet> {
        let frame = lossy(probe);

        // comment and exception packets use letter ids
        let remark = probe == b"[xx]" || probe == b"[XX]";
        let id = if remark {
            0
        } else {
            match fixed_id(probe) {
                Some(id) => id,
                None => {
                    return BadFramingSnafu {
                        tag: frame,
                        offset: frame_start,
                    }
                    .fail()
                }
            }
        };

        // a fixed field of 6 ASCII digits holds the header body length
        let field_start = self.offset;
        let field = self.read_bytes(6)?;
        self.offset += field.len() as u64;
        if field.len() != 6 {
            return TruncatedHeaderSnafu {
                tag: frame,
                offset: field_start,
            }
            .fail();
        }
        let length: usize = match std::str::from_utf8(&field)
            .ok()
            .and_then(|text| text.trim().parse().ok())
        {
            Some(length) => length,
            None => {
                return BadLengthSnafu {
                    length: lossy(&field),
                    tag: frame,
                    offset: field_start,
                }
                .fail()
            }
        };
        ensure!(
            length >= 1,
            ShortHeaderSnafu {
                length,
                tag: frame,
                offset: field_start,
            }
        );

        let body_start = self.offset;
        let body = self.read_bytes(length)?;
        self.offset += body.len() as u64;
        if body.len() != length {
            return TruncatedHeaderSnafu {
                tag: frame,
                offset: body_start,
            }
            .fail();
        }

        // header bodies must be text
        let text = std::str::from_utf8(&body).context(BadUtf8Snafu {
            tag: frame.clone(),
            offset: body_start,
        })?;

        let version = self.stream_type.version;

        if remark {
            let tag = classify_remark(text);
            return Ok(Packet::Header(HeaderPacket::new(
                version, tag, id, length, body,
            )));
        }

        self.defined[id] = true;

        if id == 0 {
            return Ok(Packet::Header(HeaderPacket::new(
                version,
                PacketTag::StreamHeader,
                id,
                length,
                body,
            )));
        }

        // a data header: the data frames that follow carry no length of
        // their own, so the body must be interpreted right away
        let document = xml::parse_legacy_header(&body).context(InvalidDataHeaderSnafu {
            id,
            offset: body_start,
        })?;
        let derived = datalen::data_length(document.root(), version, id, false).context(
            DeriveDataLengthSnafu {
                id,
                offset: body_start,
            },
        )?;
        self.learn_data_size(id, derived);

        Ok(Packet::DataHeader(DataHeaderPacket::new(
            HeaderPacket::new(version, PacketTag::DataHeader, id, length, body),
            self.strict,
        )))
    }

    fn read_fixed_data(&mut self, probe: &[u8], frame_start: u64) -> Result<Packet> {
        let id = match fixed_id(probe) {
            Some(id) => id,
            None => {
                return BadFramingSnafu {
                    tag: lossy(probe),
                    offset: frame_start,
                }
                .fail()
            }
        };
        ensure!(
            self.defined[id],
            UndefinedDataPacketSnafu {
                id,
                offset: frame_start,
            }
        );
        let expected = *self.size_table.get(&id).context(SizeUnknownSnafu {
            id,
            offset: frame_start,
        })?;

        let body_start = self.offset;
        let body = self.read_bytes(expected)?;
        self.offset += body.len() as u64;
        ensure!(
            body.len() == expected,
            TruncatedDataSnafu {
                id,
                offset: body_start,
            }
        );

        Ok(Packet::Data(DataPacket::new(
            self.stream_type.version,
            PacketTag::Data,
            id,
            body,
        )))
    }

    fn next_variable_tag(&mut self, probe: &[u8], frame_start: u64) -> Result<Packet> {
        // accumulate up to the fourth field separator
        let mut tag_bytes = probe.to_vec();
        let mut pipes = tag_bytes.iter().filter(|&&b| b == b'|').count();
        while pipes < 4 {
            let byte = self.read_bytes(1)?;
            if byte.is_empty() {
                return TruncatedPacketSnafu {
                    tag: lossy(&tag_bytes),
                    id: 0usize,
                    offset: frame_start,
                }
                .fail();
            }
            self.offset += 1;
            tag_bytes.push(byte[0]);
            if byte[0] == b'|' {
                pipes += 1;
            }
            ensure!(
                tag_bytes.len() <= TAG_SANITY_LIMIT,
                TagTooLongSnafu {
                    tag: lossy(&tag_bytes),
                    offset: frame_start,
                }
            );
        }

        let text = std::str::from_utf8(&tag_bytes).context(BadUtf8Snafu {
            tag: lossy(&tag_bytes),
            offset: frame_start,
        })?;
        // `|TAG|ID|LEN|` splits into ["", TAG, ID, LEN, ""]
        let fields: Vec<&str> = text.split('|').collect();
        let tag_text = fields[1];

        // an empty packet ID is the same as 0
        let id = if fields[2].is_empty() {
            0
        } else {
            fields[2].parse::<usize>().ok().context(BadIdSnafu {
                id: fields[2],
                offset: frame_start,
            })?
        };

        let length: usize = fields[3].parse().ok().context(BadLengthSnafu {
            length: fields[3],
            tag: tag_text,
            offset: frame_start,
        })?;
        ensure!(
            length >= 2,
            ShortPacketSnafu {
                length,
                offset: frame_start,
            }
        );

        let body_start = self.offset;
        let body = self.read_bytes(length)?;
        self.offset += body.len() as u64;
        ensure!(
            body.len() == length,
            TruncatedPacketSnafu {
                tag: tag_text,
                id,
                offset: body_start,
            }
        );

        let version = self.stream_type.version;
        let tag = PacketTag::from_wire(tag_text);

        if tag.is_data() {
            if let Some(&expected) = self.size_table.get(&id) {
                // larger packets are legal: version 3 data may carry
                // extension fields past the declared minimum
                ensure!(
                    length >= expected,
                    ShortDataPacketSnafu {
                        expected,
                        found: length,
                        id,
                        offset: body_start,
                    }
                );
            }
            return Ok(Packet::Data(DataPacket::new(version, tag, id, body)));
        }

        // header bodies must be text
        std::str::from_utf8(&body).context(BadUtf8Snafu {
            tag: tag_text,
            offset: body_start,
        })?;

        if tag == PacketTag::DataHeader {
            let document = xml::parse_header(&body).context(InvalidDataHeaderSnafu {
                id,
                offset: body_start,
            })?;
            let derived = datalen::data_length(document.root(), version, id, false).context(
                DeriveDataLengthSnafu {
                    id,
                    offset: body_start,
                },
            )?;
            self.learn_data_size(id, derived);
            return Ok(Packet::DataHeader(DataHeaderPacket::new(
                HeaderPacket::new(version, tag, id, length, body),
                self.strict,
            )));
        }

        Ok(Packet::Header(HeaderPacket::new(
            version, tag, id, length, body,
        )))
    }
}

impl<S> Iterator for PacketReader<S>
where
    S: Read,
{
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.hard_break {
            return None;
        }

        let probe = match self.read_bytes(4) {
            Ok(probe) => probe,
            Err(e) => {
                self.hard_break = true;
                return Some(Err(e));
            }
        };
        if probe.len() < 4 {
            // clean end of stream at a frame boundary
            self.hard_break = true;
            return None;
        }
        let frame_start = self.offset;
        self.offset += 4;

        let result = match probe[0] {
            b'|' => self.next_variable_tag(&probe, frame_start),
            b'[' | b':' => {
                // in strict mode, fixed tags are not admissible
                // in a version 3 stream
                if self.strict && self.stream_type.version == StreamVersion::V3_0 {
                    BadFramingSnafu {
                        tag: lossy(&probe),
                        offset: frame_start,
                    }
                    .fail()
                } else {
                    self.next_fixed_tag(&probe, frame_start)
                }
            }
            _ => BadFramingSnafu {
                tag: lossy(&probe),
                offset: frame_start,
            }
            .fail(),
        };
        if result.is_err() {
            self.hard_break = true;
        }
        Some(result)
    }
}

/// Classify the stream from its first bytes. Assume a das2.2 fixed-tag
/// stream unless the peek says otherwise.
fn detect_stream_type(peek: &[u8]) -> StreamType {
    let mut detected = StreamType::default();
    if peek.first() == Some(&b'|') {
        detected.variable_tags = true;
    }
    if peek.starts_with(b"|Qs|") {
        detected.kind = StreamKind::QStream;
    }
    if contains(peek, b"version") && contains(peek, b"\"3.0\"") {
        detected.version = StreamVersion::V3_0;
    } else if contains(peek, b"dataset_id") {
        detected.kind = StreamKind::QStream;
    }
    detected
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// The two decimal digits of a fixed frame, `[NN]` or `:NN:`.
fn fixed_id(probe: &[u8]) -> Option<usize> {
    let tens = (probe[1] as char).to_digit(10)?;
    let ones = (probe[2] as char).to_digit(10)?;
    Some((tens * 10 + ones) as usize)
}

/// Tell comment and exception bodies apart. Legacy streams do not
/// distinguish them in the framing, so the content decides; comments win
/// ties and are the default.
fn classify_remark(text: &str) -> PacketTag {
    if text.starts_with("<exception") {
        PacketTag::Exception
    } else if text.starts_with("<comment") {
        PacketTag::Comment
    } else if text.find("comment").map_or(false, |at| at > 1) {
        PacketTag::Comment
    } else if text.find("except").map_or(false, |at| at > 1) {
        PacketTag::Exception
    } else {
        PacketTag::Comment
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_header(id: &str, body: &str) -> Vec<u8> {
        format!("[{}]{:06}{}", id, body.len(), body).into_bytes()
    }

    fn legacy_data(id: &str, body: &[u8]) -> Vec<u8> {
        let mut frame = format!(":{}:", id).into_bytes();
        frame.extend_from_slice(body);
        frame
    }

    fn var_frame(tag: &str, id: &str, body: &[u8]) -> Vec<u8> {
        let mut frame = format!("|{}|{}|{}|", tag, id, body.len()).into_bytes();
        frame.extend_from_slice(body);
        frame
    }

    fn read_all(input: &[u8]) -> Vec<Result<Packet>> {
        PacketReader::new(input).unwrap().collect()
    }

    #[test]
    fn empty_input_ends_immediately() {
        let mut reader = PacketReader::new(&b""[..]).unwrap();
        assert!(reader.next().is_none());
        assert_eq!(reader.bytes_read(), 0);
    }

    #[test]
    fn input_shorter_than_a_frame_ends_cleanly() {
        let mut reader = PacketReader::new(&b"[0"[..]).unwrap();
        assert!(reader.next().is_none());
    }

    #[test]
    fn minimal_legacy_stream() {
        let input = legacy_header("00", "<stream/>");
        let mut reader = PacketReader::new(&input[..]).unwrap();

        let packet = reader.next().unwrap().unwrap();
        match packet {
            Packet::Header(header) => {
                assert_eq!(header.version(), StreamVersion::V2_2);
                assert_eq!(*header.tag(), PacketTag::StreamHeader);
                assert_eq!(header.id(), 0);
                assert_eq!(header.length(), 9);
                assert_eq!(header.content(), b"<stream/>");
            }
            other => panic!("expected a stream header, got {:?}", other),
        }
        assert!(reader.next().is_none());
        assert_eq!(reader.bytes_read(), input.len() as u64);
    }

    #[test]
    fn legacy_header_and_data_packets() {
        let mut input = legacy_header("00", "<stream/>");
        input.extend(legacy_header(
            "01",
            "<packet><yscan type=\"little_endian_real4\" nitems=\"3\"/></packet>",
        ));
        input.extend(legacy_data("01", &[7u8; 12]));
        input.extend(legacy_data("01", &[9u8; 12]));

        let mut reader = PacketReader::new(&input[..]).unwrap();
        assert!(matches!(
            reader.next().unwrap().unwrap(),
            Packet::Header(_)
        ));

        match reader.next().unwrap().unwrap() {
            Packet::DataHeader(mut header) => {
                assert_eq!(*header.tag(), PacketTag::DataHeader);
                assert_eq!(header.id(), 1);
                assert_eq!(header.base_data_len().unwrap(), Some(12));
            }
            other => panic!("expected a data header, got {:?}", other),
        }

        for fill in [7u8, 9u8] {
            match reader.next().unwrap().unwrap() {
                Packet::Data(data) => {
                    assert_eq!(*data.tag(), PacketTag::Data);
                    assert_eq!(data.id(), 1);
                    assert_eq!(data.length(), 12);
                    assert_eq!(data.content(), &[fill; 12]);
                }
                other => panic!("expected data, got {:?}", other),
            }
        }

        assert!(reader.next().is_none());
        // every consumed byte is accounted for
        assert_eq!(reader.bytes_read(), input.len() as u64);
    }

    #[test]
    fn data_before_its_header_is_undefined() {
        let mut input = legacy_header("00", "<stream/>");
        input.extend(legacy_data("01", &[0u8; 4]));
        let results = read_all(&input);
        assert!(matches!(
            results[1],
            Err(Error::UndefinedDataPacket { id: 1, .. })
        ));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn header_with_unresolved_length_cannot_frame_data() {
        let mut input = legacy_header("00", "<stream/>");
        // no type attributes: lenient derivation yields nothing
        input.extend(legacy_header("02", "<packet><y units=\"V\"/></packet>"));
        input.extend(legacy_data("02", &[0u8; 4]));

        let results = read_all(&input);
        assert!(matches!(results[1], Ok(Packet::DataHeader(_))));
        assert!(matches!(results[2], Err(Error::SizeUnknown { id: 2, .. })));
    }

    #[test]
    fn stream_not_opening_with_00_is_rejected() {
        let input = legacy_header("01", "<packet/>");
        let results = read_all(&input);
        assert!(matches!(results[0], Err(Error::NotDasStream { .. })));
    }

    #[test]
    fn data_frame_first_is_rejected() {
        let input = legacy_data("01", &[0u8; 8]);
        let results = read_all(&input);
        assert!(matches!(results[0], Err(Error::NotDasStream { .. })));
    }

    #[test]
    fn legacy_id_range() {
        let mut input = legacy_header("00", "<stream/>");
        input.extend(legacy_header(
            "99",
            "<packet><x type=\"time25\"/></packet>",
        ));
        let results = read_all(&input);
        assert!(matches!(results[1], Ok(Packet::DataHeader(_))));
        assert_eq!(results.len(), 2);

        // a three digit id cannot form a fixed frame
        let mut input = legacy_header("00", "<stream/>");
        input.extend_from_slice(b"[100]000002<>");
        let results = read_all(&input);
        assert!(matches!(results[1], Err(Error::BadFraming { .. })));
    }

    #[test]
    fn truncated_header_body_points_at_body_start() {
        let mut input = legacy_header("00", "<stream/>");
        let header_len = input.len() as u64;
        input.extend_from_slice(b"[01]001000");
        input.extend_from_slice(&[b'x'; 40]);

        let results = read_all(&input);
        match &results[1] {
            Err(Error::TruncatedHeader { offset, .. }) => {
                assert_eq!(*offset, header_len + 10);
            }
            other => panic!("expected a truncated header, got {:?}", other),
        }
    }

    #[test]
    fn zero_length_header_is_too_short() {
        let input = b"[00]000000";
        let results = read_all(input);
        assert!(matches!(
            results[0],
            Err(Error::ShortHeader { length: 0, .. })
        ));
    }

    #[test]
    fn non_numeric_header_length() {
        let input = b"[00]00a012<stream/>";
        let results = read_all(input);
        assert!(matches!(results[0], Err(Error::BadLength { .. })));
    }

    #[test]
    fn header_body_must_be_text() {
        let mut input = b"[00]000004".to_vec();
        input.extend_from_slice(&[0xFF, 0xFE, 0x01, 0x02]);
        let results = read_all(&input);
        assert!(matches!(results[0], Err(Error::BadUtf8 { .. })));
    }

    #[test]
    fn remark_packets_are_classified_by_content() {
        let mut input = legacy_header("00", "<stream/>");
        input.extend(legacy_header("xx", "<comment type=\"taskProgress\"/>"));
        input.extend(legacy_header("XX", "<exception type=\"NoDataInInterval\"/>"));
        input.extend(legacy_header("xx", "nothing to see here"));

        let packets: Vec<_> = read_all(&input)
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(*packets[1].tag(), PacketTag::Comment);
        assert_eq!(*packets[2].tag(), PacketTag::Exception);
        assert_eq!(*packets[3].tag(), PacketTag::Comment);
        assert_eq!(packets[1].id(), 0);
    }

    #[test]
    fn variable_tag_header_and_data() {
        let mut input = var_frame("Hs", "", b"<stream version=\"3.0\"/>");
        input.extend(var_frame(
            "Hx",
            "1",
            b"<packet><yset nitems=\"2,2\"><array encode=\"real4\"/></yset></packet>",
        ));
        input.extend(var_frame("Dx", "1", &[3u8; 16]));

        let mut reader = PacketReader::new(&input[..]).unwrap();
        let st = reader.stream_type();
        assert_eq!(st.version, StreamVersion::V3_0);
        assert!(st.variable_tags);
        assert_eq!(st.kind, StreamKind::Das2);

        match reader.next().unwrap().unwrap() {
            Packet::Header(header) => {
                assert_eq!(*header.tag(), PacketTag::StreamHeader);
                assert_eq!(header.id(), 0);
            }
            other => panic!("expected a stream header, got {:?}", other),
        }
        match reader.next().unwrap().unwrap() {
            Packet::DataHeader(mut header) => {
                assert_eq!(header.id(), 1);
                assert_eq!(header.base_data_len().unwrap(), Some(16));
            }
            other => panic!("expected a data header, got {:?}", other),
        }
        match reader.next().unwrap().unwrap() {
            Packet::Data(data) => {
                assert_eq!(data.id(), 1);
                assert_eq!(data.length(), 16);
            }
            other => panic!("expected data, got {:?}", other),
        }
        assert!(reader.next().is_none());
        assert_eq!(reader.bytes_read(), input.len() as u64);
    }

    #[test]
    fn variable_data_below_derived_minimum_fails() {
        let mut input = var_frame("Hs", "", b"<stream version=\"3.0\"/>");
        input.extend(var_frame(
            "Hx",
            "1",
            b"<packet><yset nitems=\"2,2\"><array encode=\"real4\"/></yset></packet>",
        ));
        input.extend(var_frame("Dx", "1", &[3u8; 8]));

        let results = read_all(&input);
        assert!(matches!(
            results[2],
            Err(Error::ShortDataPacket {
                expected: 16,
                found: 8,
                id: 1,
                ..
            })
        ));
    }

    #[test]
    fn variable_data_above_derived_minimum_is_legal() {
        let mut input = var_frame("Hs", "", b"<stream version=\"3.0\"/>");
        input.extend(var_frame(
            "Hx",
            "1",
            b"<packet><y><array encode=\"real4\"/></y></packet>",
        ));
        input.extend(var_frame("Dx", "1", &[0u8; 24]));

        let results = read_all(&input);
        assert!(matches!(results[2], Ok(Packet::Data(_))));
    }

    #[test]
    fn variable_length_minimum_is_two() {
        let results = read_all(b"|Cm|0|2|hi");
        match &results[0] {
            Ok(Packet::Header(header)) => {
                assert_eq!(*header.tag(), PacketTag::Other("Cm".to_owned()));
                assert_eq!(header.length(), 2);
            }
            other => panic!("expected a header, got {:?}", other),
        }

        let results = read_all(b"|Cm|0|1|h");
        assert!(matches!(
            results[0],
            Err(Error::ShortPacket { length: 1, .. })
        ));
    }

    #[test]
    fn variable_empty_id_is_zero() {
        let results = read_all(b"|Cm||12|a tiny aside");
        match &results[0] {
            Ok(packet) => assert_eq!(packet.id(), 0),
            other => panic!("expected a packet, got {:?}", other),
        }
    }

    #[test]
    fn variable_negative_id_is_rejected() {
        let results = read_all(b"|Cm|-1|4|abcd");
        assert!(matches!(results[0], Err(Error::BadId { .. })));
    }

    #[test]
    fn variable_tag_sanity_limit() {
        let mut input = b"|".to_vec();
        input.extend_from_slice(&[b'A'; 60]);
        let results = read_all(&input);
        assert!(matches!(results[0], Err(Error::TagTooLong { .. })));
    }

    #[test]
    fn eof_inside_a_variable_tag() {
        let results = read_all(b"|Hx|1");
        assert!(matches!(results[0], Err(Error::TruncatedPacket { .. })));
    }

    #[test]
    fn truncated_variable_body() {
        let results = read_all(b"|Cm|0|10|short");
        assert!(matches!(results[0], Err(Error::TruncatedPacket { .. })));
    }

    #[test]
    fn qstream_packets_keep_their_tag() {
        let mut input = var_frame("Qs", "", b"<stream dataset_id=\"mag\"/>");
        input.extend(var_frame("Qd", "4", &[1u8; 8]));

        let mut reader = PacketReader::new(&input[..]).unwrap();
        assert_eq!(reader.stream_type().kind, StreamKind::QStream);

        let first = reader.next().unwrap().unwrap();
        assert_eq!(*first.tag(), PacketTag::Other("Qs".to_owned()));
        match reader.next().unwrap().unwrap() {
            Packet::Data(data) => {
                assert_eq!(*data.tag(), PacketTag::QStreamData);
                assert_eq!(data.id(), 4);
            }
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[test]
    fn dataset_id_marks_a_qstream() {
        let input = legacy_header("00", "<stream dataset_id=\"juno_waves\"/>");
        let reader = PacketReader::new(&input[..]).unwrap();
        let st = reader.stream_type();
        assert_eq!(st.kind, StreamKind::QStream);
        assert_eq!(st.version, StreamVersion::V2_2);
        assert!(!st.variable_tags);
    }

    #[test]
    fn strict_mode_rejects_fixed_tags_in_v3() {
        let input = legacy_header("00", "<stream version=\"3.0\" />");

        // lenient: accepted as legacy framing
        let mut reader = PacketReader::new(&input[..]).unwrap();
        assert_eq!(reader.stream_type().version, StreamVersion::V3_0);
        assert!(matches!(
            reader.next().unwrap().unwrap(),
            Packet::Header(_)
        ));

        // strict: the mix is a framing error
        let mut reader = PacketReader::with_options(
            &input[..],
            ReaderOptions::new().strict(true),
        )
        .unwrap();
        assert!(matches!(
            reader.next().unwrap(),
            Err(Error::BadFraming { .. })
        ));
        // the reader is fused after an error
        assert!(reader.next().is_none());
    }

    #[test]
    fn strict_readers_reject_underivable_headers_lazily() {
        let mut input = legacy_header("00", "<stream/>");
        input.extend(legacy_header("03", "<packet><y units=\"V\"/></packet>"));

        // the eager table derivation stays lenient either way; the
        // packet inherits the reader's strictness for its own accessor
        let mut reader =
            PacketReader::with_options(&input[..], ReaderOptions::new().strict(true)).unwrap();
        reader.next().unwrap().unwrap();
        match reader.next().unwrap().unwrap() {
            Packet::DataHeader(mut header) => {
                assert!(matches!(
                    header.base_data_len(),
                    Err(crate::packet::Error::DeriveLength {
                        id: 3,
                        source: datalen::Error::MissingAttribute { .. },
                        ..
                    })
                ));
            }
            other => panic!("expected a data header, got {:?}", other),
        }

        let mut reader = PacketReader::new(&input[..]).unwrap();
        reader.next().unwrap().unwrap();
        match reader.next().unwrap().unwrap() {
            Packet::DataHeader(mut header) => {
                assert_eq!(header.base_data_len().unwrap(), None);
            }
            other => panic!("expected a data header, got {:?}", other),
        }
    }

    #[test]
    fn legacy_header_derivation_errors_stop_the_stream() {
        let mut input = legacy_header("00", "<stream/>");
        // `real` carries no size suffix
        input.extend(legacy_header("01", "<packet><x type=\"real\"/></packet>"));
        let results = read_all(&input);
        assert!(matches!(
            results[1],
            Err(Error::DeriveDataLength { id: 1, .. })
        ));
    }

    #[test]
    fn legacy_header_normalization_errors_stop_the_stream() {
        let mut input = legacy_header("00", "<stream/>");
        input.extend(legacy_header(
            "01",
            "<packet><p name=\"fake\">1</p></packet>",
        ));
        let results = read_all(&input);
        assert!(matches!(
            results[1],
            Err(Error::InvalidDataHeader { id: 1, .. })
        ));
    }

    #[test]
    fn later_header_redefines_the_data_size() {
        let mut input = legacy_header("00", "<stream/>");
        input.extend(legacy_header(
            "01",
            "<packet><x type=\"little_endian_real4\"/></packet>",
        ));
        input.extend(legacy_data("01", &[0u8; 4]));
        input.extend(legacy_header(
            "01",
            "<packet><x type=\"little_endian_real8\"/></packet>",
        ));
        input.extend(legacy_data("01", &[0u8; 8]));

        let results = read_all(&input);
        assert_eq!(results.len(), 5);
        for result in &results {
            assert!(result.is_ok());
        }
        match (&results[2], &results[4]) {
            (Ok(Packet::Data(first)), Ok(Packet::Data(second))) => {
                assert_eq!(first.length(), 4);
                assert_eq!(second.length(), 8);
            }
            other => panic!("expected two data packets, got {:?}", other),
        }
    }
}
