//! Fixed, versioned, little-endian wire types for particle packets.
//!
//! A packet travels as two messages: a [`WireLen`] announcing the payload
//! byte length, then the payload itself (one [`WireHdr`] followed by
//! [`WireParticle`] records). The same encoding is used by the full-domain
//! gather.

use crate::domain_error::DomainError;
use crate::geometry::Double3;
use crate::particle::Particle;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Payload kinds carried in [`WireHdr::kind`].
pub const KIND_PARTICLES: u16 = 1;

/// Size message preceding every payload.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireLen(pub u32);

impl WireLen {
    pub const SIZE: usize = size_of::<WireLen>();

    /// Length prefix for a payload of `n` bytes headed to `neighbor`.
    pub fn new(neighbor: usize, n: usize) -> Result<Self, DomainError> {
        let len = u32::try_from(n).map_err(|_| DomainError::PayloadTooLarge { neighbor, len: n })?;
        Ok(Self(len.to_le()))
    }

    pub fn get(&self) -> usize {
        u32::from_le(self.0) as usize
    }

    /// Decode a received size message, checking its length.
    pub fn decode(neighbor: usize, raw: &[u8]) -> Result<usize, DomainError> {
        if raw.len() != Self::SIZE {
            return Err(DomainError::BufferSizeMismatch {
                neighbor,
                expected: Self::SIZE,
                got: raw.len(),
            });
        }
        Ok(bytemuck::pod_read_unaligned::<WireLen>(raw).get())
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,  // = WIRE_VERSION.to_le()
    pub kind_le: u16,     // KIND_PARTICLES
    pub reserved_le: u32, // keep zero
}

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
}

/// One particle on the wire; floats travel as their IEEE-754 bit patterns.
/// `disp_le` is the absolute position, never an in-cell offset.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireParticle {
    pub family_le: u32,
    pub _pad: u32,
    pub disp_le: [u64; 3],
    pub speed_le: [u64; 3],
}

fn pack(v: Double3) -> [u64; 3] {
    v.to_array().map(|c| c.to_bits().to_le())
}

fn unpack(w: [u64; 3]) -> Double3 {
    let [x, y, z] = w.map(|c| f64::from_bits(u64::from_le(c)));
    Double3::new(x, y, z)
}

impl WireParticle {
    pub fn of(p: &Particle) -> Self {
        Self {
            family_le: p.family_id.to_le(),
            _pad: 0,
            disp_le: pack(p.displacement),
            speed_le: pack(p.lagrangian_speed),
        }
    }

    pub fn get(&self) -> Particle {
        Particle::new(
            u32::from_le(self.family_le),
            unpack(self.disp_le),
            unpack(self.speed_le),
        )
    }
}

const_assert_eq!(size_of::<WireLen>(), 4);
const_assert_eq!(size_of::<WireHdr>(), 8);
const_assert_eq!(size_of::<WireParticle>(), 56);

/// Bytes needed for a payload of `n` particles.
pub fn packet_len(n: usize) -> usize {
    size_of::<WireHdr>() + n * size_of::<WireParticle>()
}

/// Serialize particles (absolute positions) into one payload.
pub fn encode_packet(particles: &[Particle]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packet_len(particles.len()));
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_PARTICLES)));
    for p in particles {
        out.extend_from_slice(bytemuck::bytes_of(&WireParticle::of(p)));
    }
    out
}

/// Decode a payload received from `neighbor`.
///
/// Received buffers carry no alignment guarantee, so records are read with
/// `pod_read_unaligned`.
pub fn decode_packet(bytes: &[u8], neighbor: usize) -> Result<Vec<Particle>, DomainError> {
    let hdr_len = size_of::<WireHdr>();
    let rec_len = size_of::<WireParticle>();
    if bytes.len() < hdr_len {
        return Err(DomainError::MalformedPacket {
            neighbor,
            reason: format!("{} bytes is shorter than the header", bytes.len()),
        });
    }
    let hdr: WireHdr = bytemuck::pod_read_unaligned(&bytes[..hdr_len]);
    if hdr.version() != WIRE_VERSION {
        return Err(DomainError::WireVersion {
            neighbor,
            found: hdr.version(),
            expected: WIRE_VERSION,
        });
    }
    if hdr.kind() != KIND_PARTICLES {
        return Err(DomainError::MalformedPacket {
            neighbor,
            reason: format!("unexpected payload kind {}", hdr.kind()),
        });
    }
    let body = &bytes[hdr_len..];
    if body.len() % rec_len != 0 {
        return Err(DomainError::MalformedPacket {
            neighbor,
            reason: format!("{} body bytes is not a whole number of records", body.len()),
        });
    }
    Ok(body
        .chunks_exact(rec_len)
        .map(|chunk| bytemuck::pod_read_unaligned::<WireParticle>(chunk).get())
        .collect())
}
