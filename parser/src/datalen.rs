//! Derivation of data packet lengths from data header documents.
//!
//! Legacy version 2.2 data packets carry no length of their own: the only
//! way to frame them is to add up the value widths declared by the
//! `<packet>` header that precedes them. Version 3.0 packets do carry a
//! length, but the header-declared sum is still needed as the minimum
//! admissible packet size.
use das2_core::stream::StreamVersion;
use das2_core::value;
use das2_core::xml::Element;
use snafu::{Backtrace, ResultExt, Snafu};

/// Version 3.0 elements which contribute to the packet length.
/// Anything else at the top level is ignored for forward compatibility.
const PLANE_ELEMENTS: [&str; 7] = ["x", "y", "z", "w", "yset", "zset", "wset"];

/// An error deriving the data length from a header document.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A required attribute is absent (strict mode only).
    #[snafu(display(
        "Attribute `{}` missing for element `{}` in packet ID {}",
        attribute,
        element,
        id
    ))]
    MissingAttribute {
        attribute: &'static str,
        element: String,
        id: usize,
        line: u32,
        backtrace: Backtrace,
    },
    /// A type encoding token has no size suffix.
    #[snafu(display("Bad value encoding for element `{}` at line {}", element, line))]
    InvalidEncoding {
        element: String,
        line: u32,
        #[snafu(backtrace)]
        source: value::Error,
    },
    /// An item count attribute does not hold decimal integers.
    #[snafu(display(
        "Attribute `{}` of element `{}` at line {} is not a valid item count",
        attribute,
        element,
        line
    ))]
    InvalidItemCount {
        attribute: &'static str,
        element: String,
        line: u32,
        source: std::num::ParseIntError,
        backtrace: Backtrace,
    },
}

/// Type alias for a result from this module.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Compute the byte length of one data packet described by the given
/// data header element.
///
/// In strict mode a header which omits a required attribute is an error.
/// Otherwise the derivation gives up and returns `Ok(None)`, leaving the
/// omission for schema validation to diagnose.
pub fn data_length(
    packet: &Element,
    version: StreamVersion,
    id: usize,
    strict: bool,
) -> Result<Option<usize>> {
    let mut size = 0;

    for child in packet.children() {
        match version {
            StreamVersion::V2_2 => {
                // das2.2 permits no extra elements at this level,
                // so everything here must carry a type attribute
                let encoding = match child.attr("type") {
                    Some(encoding) => encoding,
                    None if strict => {
                        return MissingAttributeSnafu {
                            attribute: "type",
                            element: child.name(),
                            id,
                            line: child.line(),
                        }
                        .fail()
                    }
                    None => return Ok(None),
                };
                let width = value::value_size(encoding).context(InvalidEncodingSnafu {
                    element: child.name(),
                    line: child.line(),
                })?;

                let mut items = 1;
                if child.name() == "yscan" {
                    if let Some(nitems) = child.attr("nitems") {
                        items = nitems.trim().parse().context(InvalidItemCountSnafu {
                            attribute: "nitems",
                            element: child.name(),
                            line: child.line(),
                        })?;
                    }
                }
                size += width * items;
            }
            StreamVersion::V3_0 => {
                // das3 allows foreign elements at this level,
                // only the standard planes count
                if !PLANE_ELEMENTS.contains(&child.name()) {
                    continue;
                }

                // only the set planes hold more than one item per packet
                let mut items = 1;
                if child.name().ends_with("set") {
                    if let Some(nitems) = child.attr("nitems") {
                        for entry in nitems.split(',') {
                            let entry = entry.trim();
                            // `*` marks a runtime-variable dimension, sized at
                            // decode time through the packet's array separator
                            if entry == "*" {
                                continue;
                            }
                            let count: usize =
                                entry.parse().context(InvalidItemCountSnafu {
                                    attribute: "nitems",
                                    element: child.name(),
                                    line: child.line(),
                                })?;
                            items *= count;
                        }
                    }
                }

                // all planes in the set have the same number of items,
                // but may differ in value size
                for array in child.children().filter(|el| el.name() == "array") {
                    let encoding = match array.attr("encode") {
                        Some(encoding) => encoding,
                        None if strict => {
                            return MissingAttributeSnafu {
                                attribute: "encode",
                                element: array.name(),
                                id,
                                line: array.line(),
                            }
                            .fail()
                        }
                        None => return Ok(None),
                    };
                    let width =
                        value::value_size(encoding).context(InvalidEncodingSnafu {
                            element: array.name(),
                            line: array.line(),
                        })?;
                    size += width * items;
                }
            }
        }
    }

    Ok(Some(size))
}
