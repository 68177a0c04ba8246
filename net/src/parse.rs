// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet parsing traits

use std::num::NonZero;

/// Types which can be read from the front of a byte buffer.
pub trait Parse: Sized {
    /// The error returned when the buffer holds an invalid value.
    type Error: core::error::Error;
    /// Parse from a buffer.
    ///
    /// Returns the parsed value and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns an error in the event that parsing fails.
    fn parse(buf: &[u8]) -> Result<(Self, NonZero<usize>), ParseError<Self::Error>>;
}

/// Types which can be written to the front of a byte buffer.
pub trait DeParse {
    /// The error returned when serialization fails for reasons other than length.
    type Error;

    /// The number of bytes [`DeParse::deparse`] will write.
    fn size(&self) -> NonZero<usize>;
    /// Write a data structure (e.g., a packet header) to a buffer.
    ///
    /// Returns the number of bytes written in the event of success.
    ///
    /// # Errors
    ///
    /// Will return an error if there is not enough space in the buffer
    /// or if serialization fails from some other (implementation-dependent) reason.
    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<usize>, DeParseError<Self::Error>>;
}

/// A buffer was shorter than a header or message required.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("expected at least {expected} bytes, got {actual}")]
pub struct LengthError {
    pub(crate) expected: NonZero<usize>,
    pub(crate) actual: usize,
}

impl LengthError {
    /// The number of bytes which were required.
    #[must_use]
    pub fn expected(&self) -> NonZero<usize> {
        self.expected
    }

    /// The number of bytes which were available.
    #[must_use]
    pub fn actual(&self) -> usize {
        self.actual
    }

    /// Check that `buf` holds at least `expected` bytes.
    pub(crate) fn check(buf: &[u8], expected: NonZero<usize>) -> Result<(), LengthError> {
        if buf.len() < expected.get() {
            return Err(LengthError {
                expected,
                actual: buf.len(),
            });
        }
        Ok(())
    }
}

/// Errors which may occur while parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError<E: core::error::Error> {
    /// The buffer was too short.
    #[error(transparent)]
    Length(LengthError),
    /// The buffer held an invalid value.
    #[error(transparent)]
    Invalid(E),
}

impl<E: core::error::Error> From<LengthError> for ParseError<E> {
    fn from(e: LengthError) -> Self {
        ParseError::Length(e)
    }
}

/// Errors which may occur while serializing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeParseError<E> {
    /// The output buffer was too short.
    #[error(transparent)]
    Length(LengthError),
    /// The value could not be serialized.
    #[error("invalid value")]
    Invalid(E),
}

impl<E> From<LengthError> for DeParseError<E> {
    fn from(e: LengthError) -> Self {
        DeParseError::Length(e)
    }
}

/// Sequential reader over a control message.
#[derive(Debug)]
pub(crate) struct Reader<'buf> {
    inner: &'buf [u8],
    remaining: usize,
}

impl<'buf> Reader<'buf> {
    pub(crate) fn new(buf: &'buf [u8]) -> Reader<'buf> {
        Reader {
            inner: buf,
            remaining: buf.len(),
        }
    }

    fn position(&self) -> usize {
        self.inner.len() - self.remaining
    }

    pub(crate) fn consumed(&self) -> usize {
        self.position()
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'buf [u8], LengthError> {
        if n > self.remaining {
            return Err(LengthError {
                expected: NonZero::new(self.position() + n).unwrap_or(NonZero::<usize>::MIN),
                actual: self.inner.len(),
            });
        }
        let start = self.position();
        self.remaining -= n;
        Ok(&self.inner[start..start + n])
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), LengthError> {
        self.take(n).map(|_| ())
    }

    /// Take the bytes up to a NUL, consuming the NUL as well.
    pub(crate) fn take_until_nul(&mut self) -> Result<&'buf [u8], LengthError> {
        let rest = &self.inner[self.position()..];
        let Some(len) = rest.iter().position(|b| *b == 0) else {
            // a terminator is needed past what is left
            return Err(LengthError {
                expected: NonZero::new(self.inner.len() + 1).unwrap_or(NonZero::<usize>::MIN),
                actual: self.inner.len(),
            });
        };
        let name = self.take(len)?;
        self.skip(1)?;
        Ok(name)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, LengthError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, LengthError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, LengthError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, LengthError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], LengthError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// Sequential writer for a control message.
#[derive(Debug)]
pub(crate) struct Writer<'buf> {
    inner: &'buf mut [u8],
    remaining: usize,
}

impl<'buf> Writer<'buf> {
    pub(crate) fn new(buf: &'buf mut [u8]) -> Writer<'buf> {
        let len = buf.len();
        Writer {
            inner: buf,
            remaining: len,
        }
    }

    fn position(&self) -> usize {
        self.inner.len() - self.remaining
    }

    pub(crate) fn written(&self) -> usize {
        self.position()
    }

    pub(crate) fn put(&mut self, bytes: &[u8]) -> Result<(), LengthError> {
        if bytes.len() > self.remaining {
            return Err(LengthError {
                expected: NonZero::new(self.position() + bytes.len())
                    .unwrap_or(NonZero::<usize>::MIN),
                actual: self.inner.len(),
            });
        }
        let start = self.position();
        self.inner[start..start + bytes.len()].copy_from_slice(bytes);
        self.remaining -= bytes.len();
        Ok(())
    }

    pub(crate) fn u8(&mut self, val: u8) -> Result<(), LengthError> {
        self.put(&[val])
    }

    pub(crate) fn u16(&mut self, val: u16) -> Result<(), LengthError> {
        self.put(&val.to_be_bytes())
    }

    pub(crate) fn u32(&mut self, val: u32) -> Result<(), LengthError> {
        self.put(&val.to_be_bytes())
    }

    pub(crate) fn u64(&mut self, val: u64) -> Result<(), LengthError> {
        self.put(&val.to_be_bytes())
    }
}
