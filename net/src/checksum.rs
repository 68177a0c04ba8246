// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Traits for checksum calculation and manipulation

use std::fmt::Debug;

/// A trait for checksum calculation and manipulation.
///
/// This trait is used to calculate and manipulate checksums in the outer headers built
/// around tunneled packets.
pub trait Checksum {
    /// The error returned when the checksum cannot be computed.
    type Error;
    /// The payload over which the checksum is computed (if any).
    type Payload<'a>: ?Sized
    where
        Self: 'a;
    /// The checksum type.
    type Checksum: Eq + Copy + Sized + Debug;

    /// Get the checksum value from the header
    fn checksum(&self) -> Self::Checksum;

    /// Compute the checksum value from the header and payload.
    ///
    /// This method _does not_ update the checksum field.
    ///
    /// # Errors
    ///
    /// Implementation dependent; typically the payload is too large to be covered.
    fn compute_checksum(&self, payload: &Self::Payload<'_>) -> Result<Self::Checksum, Self::Error>;

    /// Set the checksum value in the header.
    ///
    /// The validity of the checksum is not checked.
    fn set_checksum(&mut self, checksum: Self::Checksum) -> &mut Self;

    /// Compute and store the checksum.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Checksum::compute_checksum`], in which case the header is unchanged.
    fn update_checksum(&mut self, payload: &Self::Payload<'_>) -> Result<&mut Self, Self::Error> {
        let checksum = self.compute_checksum(payload)?;
        Ok(self.set_checksum(checksum))
    }
}
