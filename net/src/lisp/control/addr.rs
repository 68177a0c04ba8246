// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! AFI-tagged addresses of control messages

use crate::ip::{Afi, IANA_AFI_DISTINGUISHED_NAME, IANA_AFI_LCAF};
use crate::lisp::control::ControlParseError;
use crate::parse::{LengthError, ParseError, Reader, Writer};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// An address as carried in control messages: a 16 bit AFI followed by the address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LispAddr {
    /// AFI 0, no address
    NoAddress,
    /// An IPv4 or IPv6 address
    Ip(IpAddr),
    /// An address in the LISP canonical address format, kept opaque
    Lcaf(Lcaf),
    /// A distinguished name, without the NUL terminating it on the wire
    Name(Vec<u8>),
}

/// An opaque LCAF address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lcaf {
    /// LCAF type
    pub kind: u8,
    /// LCAF flags
    pub flags: u8,
    /// Type specific contents
    pub body: Vec<u8>,
}

impl LispAddr {
    /// The IP address, if any.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            LispAddr::Ip(ip) => Some(*ip),
            _ => None,
        }
    }

    /// The IP family, if any.
    #[must_use]
    pub fn afi(&self) -> Option<Afi> {
        self.ip().as_ref().map(Afi::of)
    }

    pub(crate) fn wire_len(&self) -> usize {
        2 + match self {
            LispAddr::NoAddress => 0,
            LispAddr::Ip(ip) => Afi::of(ip).addr_len(),
            LispAddr::Lcaf(lcaf) => 6 + lcaf.body.len(),
            LispAddr::Name(name) => name.len() + 1,
        }
    }

    pub(crate) fn read(r: &mut Reader) -> Result<LispAddr, ParseError<ControlParseError>> {
        let afi = r.u16()?;
        match afi {
            0 => Ok(LispAddr::NoAddress),
            IANA_AFI_LCAF => {
                r.skip(1)?;
                let flags = r.u8()?;
                let kind = r.u8()?;
                r.skip(1)?;
                let len = usize::from(r.u16()?);
                let body = r.take(len)?.to_vec();
                Ok(LispAddr::Lcaf(Lcaf { kind, flags, body }))
            }
            IANA_AFI_DISTINGUISHED_NAME => Ok(LispAddr::Name(r.take_until_nul()?.to_vec())),
            other => match Afi::from_iana(other) {
                Some(Afi::Ipv4) => Ok(LispAddr::Ip(Ipv4Addr::from(r.array::<4>()?).into())),
                Some(Afi::Ipv6) => Ok(LispAddr::Ip(Ipv6Addr::from(r.array::<16>()?).into())),
                None => Err(ParseError::Invalid(ControlParseError::UnsupportedAfi(other))),
            },
        }
    }

    pub(crate) fn write(&self, w: &mut Writer) -> Result<(), LengthError> {
        match self {
            LispAddr::NoAddress => w.u16(0),
            LispAddr::Ip(IpAddr::V4(ip)) => {
                w.u16(Afi::Ipv4.iana())?;
                w.put(&ip.octets())
            }
            LispAddr::Ip(IpAddr::V6(ip)) => {
                w.u16(Afi::Ipv6.iana())?;
                w.put(&ip.octets())
            }
            LispAddr::Name(name) => {
                w.u16(IANA_AFI_DISTINGUISHED_NAME)?;
                w.put(name)?;
                w.u8(0)
            }
            LispAddr::Lcaf(lcaf) => {
                // the body length was bounded when the message size was computed
                let len = u16::try_from(lcaf.body.len()).unwrap_or(u16::MAX);
                w.u16(IANA_AFI_LCAF)?;
                w.put(&[0, lcaf.flags, lcaf.kind, 0])?;
                w.u16(len)?;
                w.put(&lcaf.body)
            }
        }
    }

    /// Check that `mask_len` is a valid prefix length for this address.
    pub(crate) fn check_mask_len(&self, mask_len: u8) -> Result<(), ControlParseError> {
        match self.afi() {
            Some(afi) if mask_len > afi.max_prefix_len() => {
                Err(ControlParseError::BadMaskLength { afi, mask_len })
            }
            _ => Ok(()),
        }
    }
}

impl From<IpAddr> for LispAddr {
    fn from(ip: IpAddr) -> Self {
        LispAddr::Ip(ip)
    }
}

impl Display for LispAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LispAddr::NoAddress => write!(f, "(none)"),
            LispAddr::Ip(ip) => write!(f, "{ip}"),
            LispAddr::Lcaf(lcaf) => write!(f, "lcaf(type {})", lcaf.kind),
            LispAddr::Name(name) => write!(f, "'{}'", String::from_utf8_lossy(name)),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use crate::lisp::control::{ControlParseError, Lcaf, LispAddr};
    use crate::parse::{ParseError, Reader, Writer};
    use std::net::{IpAddr, Ipv4Addr};

    fn write(addr: &LispAddr) -> Vec<u8> {
        let mut buf = vec![0u8; addr.wire_len()];
        addr.write(&mut Writer::new(&mut buf)).unwrap();
        buf
    }

    #[test]
    fn ipv4_encoding() {
        let addr = LispAddr::Ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9)));
        assert_eq!(write(&addr), [0, 1, 192, 0, 2, 9]);
    }

    #[test]
    fn addresses_read_back() {
        bolero::check!()
            .with_type()
            .for_each(|(v4, v6, kind, body): &(u32, u128, u8, Vec<u8>)| {
                let addrs = [
                    LispAddr::NoAddress,
                    LispAddr::Ip(IpAddr::from(v4.to_be_bytes())),
                    LispAddr::Ip(IpAddr::from(v6.to_be_bytes())),
                    LispAddr::Lcaf(Lcaf {
                        kind: *kind,
                        flags: 0,
                        body: body.iter().copied().take(64).collect(),
                    }),
                    LispAddr::Name(body.iter().copied().filter(|b| *b != 0).take(64).collect()),
                ];
                for addr in addrs {
                    let bytes = write(&addr);
                    let mut reader = Reader::new(&bytes);
                    assert_eq!(LispAddr::read(&mut reader).unwrap(), addr);
                    assert_eq!(reader.consumed(), bytes.len());
                }
            });
    }

    #[test]
    fn distinguished_names() {
        let bytes = [0u8, 17, b'x', b't', b'r', 0, 0, 1];
        let mut reader = Reader::new(&bytes);
        let name = LispAddr::read(&mut reader).unwrap();
        assert_eq!(name, LispAddr::Name(b"xtr".to_vec()));
        assert_eq!(reader.consumed(), 6);
        assert_eq!(name.ip(), None);
        assert_eq!(name.to_string(), "'xtr'");
        assert!(matches!(
            LispAddr::read(&mut Reader::new(&[0, 17, b'x'])),
            Err(ParseError::Length(_))
        ));
    }

    #[test]
    fn unknown_afi_is_refused() {
        let bytes = [0u8, 18, 1, 2, 3, 4];
        match LispAddr::read(&mut Reader::new(&bytes)) {
            Err(ParseError::Invalid(ControlParseError::UnsupportedAfi(18))) => {}
            other => unreachable!("unexpected {other:?}"),
        }
        assert!(matches!(
            LispAddr::read(&mut Reader::new(&[0, 1, 10])),
            Err(ParseError::Length(_))
        ));
    }
}
