//! Packet content tags.
//!
//! Every packet on a das stream carries a two-letter tag naming its role.
//! Version 3.0 streams write the tag on the wire; for legacy 2.2 streams
//! the tag is derived from the fixed framing while reading.
use std::fmt;

/// The two-letter content tag classifying a packet's role in the stream.
///
/// Unknown tags are possible in version 3.0 streams, which permit extra
/// packet kinds for forward compatibility; those are preserved verbatim
/// in the [`Other`](PacketTag::Other) variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PacketTag {
    /// `Hs`: the stream-level header.
    StreamHeader,
    /// `Hx`: a header describing data packets to come.
    DataHeader,
    /// `Hi`: the header of an I-slice dataset (version 3.0).
    SliceHeader,
    /// `Hc`: a comment packet.
    Comment,
    /// `He`: an exception packet.
    Exception,
    /// `Dx`: a data payload packet.
    Data,
    /// `Qd`: a QStream data payload packet.
    QStreamData,
    /// Any other tag found on the wire.
    Other(String),
}

impl PacketTag {
    /// Interpret a tag as found on the wire.
    pub fn from_wire(tag: &str) -> PacketTag {
        match tag {
            "Hs" => PacketTag::StreamHeader,
            "Hx" => PacketTag::DataHeader,
            "Hi" => PacketTag::SliceHeader,
            "Hc" => PacketTag::Comment,
            "He" => PacketTag::Exception,
            "Dx" => PacketTag::Data,
            "Qd" => PacketTag::QStreamData,
            _ => PacketTag::Other(tag.to_owned()),
        }
    }

    /// The tag's wire form.
    pub fn as_str(&self) -> &str {
        match self {
            PacketTag::StreamHeader => "Hs",
            PacketTag::DataHeader => "Hx",
            PacketTag::SliceHeader => "Hi",
            PacketTag::Comment => "Hc",
            PacketTag::Exception => "He",
            PacketTag::Data => "Dx",
            PacketTag::QStreamData => "Qd",
            PacketTag::Other(tag) => tag,
        }
    }

    /// Whether this tag names a data payload packet.
    pub fn is_data(&self) -> bool {
        matches!(self, PacketTag::Data | PacketTag::QStreamData)
    }
}

impl fmt::Display for PacketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_round_trip() {
        for wire in ["Hs", "Hx", "Hi", "Hc", "He", "Dx", "Qd"] {
            let tag = PacketTag::from_wire(wire);
            assert!(!matches!(tag, PacketTag::Other(_)));
            assert_eq!(tag.as_str(), wire);
        }
    }

    #[test]
    fn unknown_tags_are_preserved() {
        let tag = PacketTag::from_wire("XX");
        assert_eq!(tag, PacketTag::Other("XX".to_owned()));
        assert_eq!(tag.to_string(), "XX");
    }

    #[test]
    fn data_tags() {
        assert!(PacketTag::Data.is_data());
        assert!(PacketTag::QStreamData.is_data());
        assert!(!PacketTag::StreamHeader.is_data());
        assert!(!PacketTag::from_wire("Cm").is_data());
    }
}
