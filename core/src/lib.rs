#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    unused_qualifications,
    unused_import_braces
)]

//! This is the core das2 library, containing the basic concepts and data
//! structures shared by das2/das3 stream readers: packet content tags,
//! stream identity, the owned header document model, and value encoding
//! utilities.
//!
//! Higher level abstractions, such as the packet reader itself, are built
//! on top of this crate.

pub mod stream;
pub mod tag;
pub mod value;
pub mod xml;

pub use stream::{StreamKind, StreamType, StreamVersion};
pub use tag::PacketTag;
pub use value::value_size;
pub use xml::{Document, Element};
