//! The packets yielded while reading a stream.
//!
//! A stream is a sequence of three kinds of packet: general headers, data
//! headers, and data payloads. The distinction is a tagged variant rather
//! than a hierarchy; the extra state of the header kinds (the parsed
//! document, the derived data length) lives in memoized fields populated
//! on first access.
use crate::datalen;
use crate::xml;
use das2_core::stream::StreamVersion;
use das2_core::tag::PacketTag;
use das2_core::xml::Document;
use snafu::{ResultExt, Snafu};

/// An error interpreting the content of a packet.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The header content could not be parsed as a document.
    #[snafu(display("Could not parse header content of packet {} id {}", tag, id))]
    ParseHeader {
        tag: PacketTag,
        id: usize,
        #[snafu(backtrace)]
        source: xml::Error,
    },
    /// The data length could not be derived from the header document.
    #[snafu(display("Could not derive the data length for packet ID {}", id))]
    DeriveLength {
        id: usize,
        #[snafu(backtrace)]
        source: datalen::Error,
    },
}

/// Type alias for a result from this module.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A header packet of a general nature: stream headers, comments,
/// exceptions, and any other textual packet.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderPacket {
    version: StreamVersion,
    tag: PacketTag,
    id: usize,
    length: usize,
    content: Vec<u8>,
    /// cache of the parsed document
    tree: Option<Document>,
}

impl HeaderPacket {
    pub(crate) fn new(
        version: StreamVersion,
        tag: PacketTag,
        id: usize,
        length: usize,
        content: Vec<u8>,
    ) -> Self {
        HeaderPacket {
            version,
            tag,
            id,
            length,
            content,
            tree: None,
        }
    }

    /// The version of the stream that framed this packet.
    pub fn version(&self) -> StreamVersion {
        self.version
    }

    /// The packet's content tag.
    pub fn tag(&self) -> &PacketTag {
        &self.tag
    }

    /// The packet's stream-id. Stream-level headers are always id 0.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The byte length of the packet body as read from the wire.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The raw body bytes. Always valid UTF-8 for header packets.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Get the header's document tree, parsing it on first access.
    ///
    /// Legacy version 2.2 headers are normalized while parsing: their
    /// attribute-form `<properties>` elements come back as `<p>` children
    /// (see [`xml::parse_legacy_header`]). The parse happens at most once
    /// per packet, no matter how many consumers ask.
    pub fn tree(&mut self) -> Result<&Document> {
        match self.tree {
            Some(ref tree) => Ok(tree),
            None => {
                let tree = match self.version {
                    StreamVersion::V2_2 => xml::parse_legacy_header(&self.content),
                    StreamVersion::V3_0 => xml::parse_header(&self.content),
                }
                .with_context(|_| ParseHeaderSnafu {
                    tag: self.tag.clone(),
                    id: self.id,
                })?;
                Ok(self.tree.insert(tree))
            }
        }
    }
}

/// A header packet that describes the data packets to come for one
/// stream-id.
#[derive(Debug, Clone, PartialEq)]
pub struct DataHeaderPacket {
    header: HeaderPacket,
    /// whether length derivation rejects schema-visible omissions,
    /// inherited from the reader that produced the packet
    strict: bool,
    /// cache of the derived data length
    data_len: Option<Option<usize>>,
}

impl DataHeaderPacket {
    pub(crate) fn new(header: HeaderPacket, strict: bool) -> Self {
        DataHeaderPacket {
            header,
            strict,
            data_len: None,
        }
    }

    /// The version of the stream that framed this packet.
    pub fn version(&self) -> StreamVersion {
        self.header.version()
    }

    /// The packet's content tag.
    pub fn tag(&self) -> &PacketTag {
        self.header.tag()
    }

    /// The packet's stream-id.
    pub fn id(&self) -> usize {
        self.header.id()
    }

    /// The byte length of the packet body as read from the wire.
    pub fn length(&self) -> usize {
        self.header.length()
    }

    /// The raw body bytes.
    pub fn content(&self) -> &[u8] {
        self.header.content()
    }

    /// Get the header's document tree, parsing it on first access.
    pub fn tree(&mut self) -> Result<&Document> {
        self.header.tree()
    }

    /// The number of bytes every data packet described by this header
    /// must contain, derived from the document on first access.
    ///
    /// Under a strict reader, a header omitting a required attribute
    /// fails here; under a lenient one the derivation gives up with
    /// `None` and leaves the omission for schema validation to diagnose.
    /// Version 3.0 streams may put extra information in each data packet
    /// after the known das values; that extent is not included here.
    pub fn base_data_len(&mut self) -> Result<Option<usize>> {
        if let Some(derived) = self.data_len {
            return Ok(derived);
        }
        let version = self.header.version;
        let id = self.header.id;
        let strict = self.strict;
        let derived = {
            let tree = self.header.tree()?;
            datalen::data_length(tree.root(), version, id, strict)
                .context(DeriveLengthSnafu { id })?
        };
        self.data_len = Some(derived);
        Ok(derived)
    }
}

/// A packet of data to display or otherwise use. The payload is opaque
/// at this level; only its framing is known.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPacket {
    version: StreamVersion,
    tag: PacketTag,
    id: usize,
    content: Vec<u8>,
}

impl DataPacket {
    pub(crate) fn new(
        version: StreamVersion,
        tag: PacketTag,
        id: usize,
        content: Vec<u8>,
    ) -> Self {
        DataPacket {
            version,
            tag,
            id,
            content,
        }
    }

    /// The version of the stream that framed this packet.
    pub fn version(&self) -> StreamVersion {
        self.version
    }

    /// The packet's content tag, `Dx` or `Qd`.
    pub fn tag(&self) -> &PacketTag {
        &self.tag
    }

    /// The packet's stream-id, matching the data header that described it.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The byte length of the payload.
    pub fn length(&self) -> usize {
        self.content.len()
    }

    /// The raw payload bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// A single packet from a das2 or das3 stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// A header packet of a general nature.
    Header(HeaderPacket),
    /// A header describing data packets to come.
    DataHeader(DataHeaderPacket),
    /// A packet of data.
    Data(DataPacket),
}

impl Packet {
    /// The version of the stream that framed this packet.
    pub fn version(&self) -> StreamVersion {
        match self {
            Packet::Header(p) => p.version(),
            Packet::DataHeader(p) => p.version(),
            Packet::Data(p) => p.version(),
        }
    }

    /// The packet's content tag.
    pub fn tag(&self) -> &PacketTag {
        match self {
            Packet::Header(p) => p.tag(),
            Packet::DataHeader(p) => p.tag(),
            Packet::Data(p) => p.tag(),
        }
    }

    /// The packet's stream-id.
    pub fn id(&self) -> usize {
        match self {
            Packet::Header(p) => p.id(),
            Packet::DataHeader(p) => p.id(),
            Packet::Data(p) => p.id(),
        }
    }

    /// The byte length of the packet body as read from the wire.
    pub fn length(&self) -> usize {
        match self {
            Packet::Header(p) => p.length(),
            Packet::DataHeader(p) => p.length(),
            Packet::Data(p) => p.length(),
        }
    }

    /// The raw body bytes.
    pub fn content(&self) -> &[u8] {
        match self {
            Packet::Header(p) => p.content(),
            Packet::DataHeader(p) => p.content(),
            Packet::Data(p) => p.content(),
        }
    }
}
