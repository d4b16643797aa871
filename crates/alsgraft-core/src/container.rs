//! Gzip container framing around the document tree.
//!
//! A set file is a gzip stream holding one UTF-8 XML document: a fixed
//! wrapper element containing exactly one child, the set itself. The XML
//! prolog and the trailing newline are written verbatim rather than through
//! the generic serializer, matching the format's native writer. The gzip
//! framing itself carries a timestamp and is not byte-stable; the round-trip
//! contract is stated over the decompressed bytes.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{SetError, SetResult};
use crate::tree::{self, Element};

pub(crate) const ROOT_TAG: &str = "Ableton";

const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Decompresses and parses a container, validating the wrapper shape.
pub(crate) fn read(bytes: &[u8]) -> SetResult<Element> {
    let mut decoder = GzDecoder::new(bytes);
    let mut xml = String::new();
    decoder.read_to_string(&mut xml).map_err(|error| {
        SetError::Format(format!("failed to decompress set container: {error}"))
    })?;

    let root = tree::parse_document(&xml)?;
    if root.tag() != ROOT_TAG {
        return Err(SetError::Format(format!(
            "the data does not contain an {ROOT_TAG} document (root tag '{}')",
            root.tag()
        )));
    }
    if root.children().len() != 1 {
        return Err(SetError::Format(format!(
            "the container must hold exactly one nested element, found {}",
            root.children().len()
        )));
    }
    Ok(root)
}

/// Serializes a container root to the uncompressed document bytes:
/// prolog, body, single trailing newline.
pub(crate) fn write_xml(root: &Element) -> Vec<u8> {
    let mut xml = String::with_capacity(XML_PROLOG.len() + 1024);
    xml.push_str(XML_PROLOG);
    root.write_xml(&mut xml);
    xml.push('\n');
    xml.into_bytes()
}

/// Serializes and gzips a container root.
pub(crate) fn write(root: &Element) -> SetResult<Vec<u8>> {
    compress(&write_xml(root))
        .map_err(|error| SetError::Format(format!("failed to compress set container: {error}")))
}

fn compress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}
