//! Packet encoding and decoding.
//!
//! The encoder writes the header fields in wire order and fills in the CRC32
//! over the canonical coverage region. The decoder is total: any datagram
//! maps to exactly one [`Decoded`] outcome and never panics or propagates an
//! error past this module.

use std::{
    convert::TryFrom,
    io::{self, Cursor, Read, Write},
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use fraglink_core::{constants::HEADER_SIZE, error::DecodingErrorKind};

use crate::{
    checksum,
    packet::{EnumConverter, Packet, PacketBody, PacketKind},
};

/// The outcome of decoding one datagram.
///
/// Distinguishes "malformed" (drop), "ok" (deliver) and "ok but the checksum
/// failed" (request a resend) without using errors for control flow.
#[derive(Debug)]
pub enum Decoded {
    /// A well-formed packet whose checksum verified.
    Valid(Packet),
    /// A well-formed packet whose checksum did not verify.
    ChecksumMismatch(Packet),
    /// Not a packet; the reason it was rejected.
    Malformed(DecodingErrorKind),
}

/// Builds the CRC32 coverage region for a packet.
///
/// Coverage is sequence, kind, window, flags and name_length in wire order
/// plus, when `include_payload` is set, the payload bytes. The checksum field
/// itself is never covered.
pub fn coverage_bytes(packet: &Packet, include_payload: bool) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE - 4 + packet.body.wire_len());
    // Writing into a Vec cannot fail; the io::Result is structural.
    let _ = write_coverage(&mut bytes, packet, include_payload);
    bytes
}

fn write_coverage(out: &mut Vec<u8>, packet: &Packet, include_payload: bool) -> io::Result<()> {
    out.write_u32::<BigEndian>(packet.sequence)?;
    out.write_u8(packet.kind.to_u8())?;
    out.write_u16::<BigEndian>(packet.window)?;
    out.write_u8(packet.flags)?;
    out.write_u16::<BigEndian>(packet.body.name_length())?;
    if include_payload {
        write_body(out, &packet.body)?;
    }
    Ok(())
}

fn write_body(out: &mut Vec<u8>, body: &PacketBody) -> io::Result<()> {
    match body {
        PacketBody::None => Ok(()),
        PacketBody::Message(data) => out.write_all(data),
        PacketBody::File { name, content } => {
            out.write_all(name)?;
            out.write_all(content)
        }
    }
}

/// Computes the checksum a valid encoding of `packet` must carry.
pub fn expected_checksum(packet: &Packet) -> u32 {
    checksum::crc32(&coverage_bytes(packet, packet.kind.carries_payload()))
}

/// Serializes a packet into a datagram with a valid checksum.
pub fn encode(packet: &Packet) -> io::Result<Vec<u8>> {
    encode_with_checksum(packet, expected_checksum(packet))
}

/// Serializes a packet with a zeroed checksum field.
///
/// Exists for the operator's corrupt-first-packet switch: the receiver must
/// observe a checksum mismatch and answer with a RESEND.
pub fn encode_corrupted(packet: &Packet) -> io::Result<Vec<u8>> {
    encode_with_checksum(packet, 0)
}

fn encode_with_checksum(packet: &Packet, crc: u32) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_SIZE + packet.body.wire_len());
    out.write_u32::<BigEndian>(packet.sequence)?;
    out.write_u8(packet.kind.to_u8())?;
    out.write_u32::<BigEndian>(crc)?;
    out.write_u16::<BigEndian>(packet.window)?;
    out.write_u8(packet.flags)?;
    out.write_u16::<BigEndian>(packet.body.name_length())?;
    write_body(&mut out, &packet.body)?;
    Ok(out)
}

/// Decodes one datagram.
pub fn decode(data: &[u8]) -> Decoded {
    match try_decode(data) {
        Ok(decoded) => decoded,
        // A short read can only mean the datagram ended inside the header.
        Err(_) => Decoded::Malformed(DecodingErrorKind::TruncatedHeader),
    }
}

fn try_decode(data: &[u8]) -> io::Result<Decoded> {
    let mut cursor = Cursor::new(data);
    let sequence = cursor.read_u32::<BigEndian>()?;
    let kind_code = cursor.read_u8()?;
    let received_crc = cursor.read_u32::<BigEndian>()?;
    let window = cursor.read_u16::<BigEndian>()?;
    let flags = cursor.read_u8()?;
    let name_length = cursor.read_u16::<BigEndian>()? as usize;

    let kind = match PacketKind::try_from(kind_code) {
        Ok(kind) => kind,
        Err(_) => return Ok(Decoded::Malformed(DecodingErrorKind::PacketKind)),
    };

    let body = match kind {
        PacketKind::SendData => {
            let mut payload = Vec::with_capacity(data.len() - HEADER_SIZE);
            cursor.read_to_end(&mut payload)?;
            PacketBody::Message(payload)
        }
        PacketKind::SendFile => {
            let mut payload = Vec::with_capacity(data.len() - HEADER_SIZE);
            cursor.read_to_end(&mut payload)?;
            if name_length > payload.len() {
                return Ok(Decoded::Malformed(DecodingErrorKind::NameLength));
            }
            let content = payload.split_off(name_length);
            PacketBody::File { name: payload, content }
        }
        _ => PacketBody::None,
    };

    let packet = Packet { sequence, kind, window, flags, body };
    // Verify over the wire bytes themselves (header minus the checksum field,
    // then the payload), so corruption of any covered byte is caught even
    // when body parsing does not consume that field.
    let mut covered = Vec::with_capacity(data.len() - 4);
    covered.extend_from_slice(&data[0..5]);
    covered.extend_from_slice(&data[9..]);
    if checksum::verify(&covered, received_crc) {
        Ok(Decoded::Valid(packet))
    } else {
        Ok(Decoded::ChecksumMismatch(packet))
    }
}
