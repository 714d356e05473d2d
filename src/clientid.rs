//! Client identity keys for the lease table.
//!
//! A [`ClientId`] is a tagged byte string: a variant code saying where the
//! identity came from, plus the raw identifying bytes. The variant keeps
//! otherwise-colliding payloads apart (a MAC address reused verbatim inside a
//! DUID must not alias the plain hardware-address identity).

use std::fmt;

use crate::error::{Error, Result};

/// Option code carrying the DHCPv4 client identifier (RFC 2132, option 61).
pub const OPTION_CLIENT_IDENTIFIER: u8 = 61;

/// The source a [`ClientId`] was derived from.
///
/// The discriminants are the codes used by durable/interop backends; the
/// in-memory store only relies on them for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CidVariant {
    /// Raw hardware (MAC) address.
    HwAddress = 0,
    /// DHCPv4 client identifier supplied by the client (option 61).
    Opt61 = 1,
    /// DHCPv6 DUID from the client-id option.
    Duid = 2,
    /// DHCPv6 DUID plus IAID, typically for IA_TA assignments.
    DuidIaid = 3,
    /// Arbitrary bytes for quick experiments. Do not use in real plugins.
    Experimental = 0xff,
}

impl TryFrom<u8> for CidVariant {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::HwAddress),
            1 => Ok(Self::Opt61),
            2 => Ok(Self::Duid),
            3 => Ok(Self::DuidIaid),
            0xff => Ok(Self::Experimental),
            other => Err(other),
        }
    }
}

/// Identifies the client a set of leases belongs to.
///
/// Values compare and hash byte-wise over `(variant, data)`, so a `ClientId`
/// can key a map directly. `data` always holds raw wire bytes, never a
/// human-readable serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId {
    variant: CidVariant,
    data: Vec<u8>,
}

impl ClientId {
    /// Creates a `ClientId` from a hardware (MAC) address.
    pub fn from_hw_addr(addr: &[u8]) -> Self {
        Self {
            variant: CidVariant::HwAddress,
            data: addr.to_vec(),
        }
    }

    /// Creates a `ClientId` from a DHCPv4 client identifier option (option 61).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedOptionCode`] if `code` is not option 61.
    pub fn from_opt61(code: u8, value: &[u8]) -> Result<Self> {
        if code != OPTION_CLIENT_IDENTIFIER {
            return Err(Error::UnexpectedOptionCode(code));
        }
        Ok(Self {
            variant: CidVariant::Opt61,
            data: value.to_vec(),
        })
    }

    /// Creates a `ClientId` from a DHCPv6 DUID.
    pub fn from_duid(duid: &[u8]) -> Self {
        Self {
            variant: CidVariant::Duid,
            data: duid.to_vec(),
        }
    }

    /// Creates a `ClientId` from a DHCPv6 DUID and an IA_*A iaid.
    pub fn from_duid_iaid(duid: &[u8], iaid: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(iaid.len() + duid.len());
        data.extend_from_slice(&iaid);
        data.extend_from_slice(duid);
        Self {
            variant: CidVariant::DuidIaid,
            data,
        }
    }

    /// Creates a `ClientId` from arbitrary bytes. Experiments only.
    pub fn experimental(data: &[u8]) -> Self {
        Self {
            variant: CidVariant::Experimental,
            data: data.to_vec(),
        }
    }

    pub fn variant(&self) -> CidVariant {
        self.variant
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.variant as u8)?;
        for byte in &self.data {
            write!(f, ":{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_variant_codes() {
        assert_eq!(CidVariant::try_from(0), Ok(CidVariant::HwAddress));
        assert_eq!(CidVariant::try_from(1), Ok(CidVariant::Opt61));
        assert_eq!(CidVariant::try_from(2), Ok(CidVariant::Duid));
        assert_eq!(CidVariant::try_from(3), Ok(CidVariant::DuidIaid));
        assert_eq!(CidVariant::try_from(0xff), Ok(CidVariant::Experimental));
        assert_eq!(CidVariant::try_from(4), Err(4));
    }

    #[test]
    fn test_variants_do_not_alias() {
        let mac = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        let as_hw = ClientId::from_hw_addr(&mac);
        let as_duid = ClientId::from_duid(&mac);
        let as_experimental = ClientId::experimental(&mac);

        assert_ne!(as_hw, as_duid);
        assert_ne!(as_hw, as_experimental);
        assert_ne!(as_duid, as_experimental);
        assert_eq!(as_hw, ClientId::from_hw_addr(&mac));
    }

    #[test]
    fn test_opt61_code_check() {
        let id = ClientId::from_opt61(61, &[1, 2, 3]).unwrap();
        assert_eq!(id.variant(), CidVariant::Opt61);
        assert_eq!(id.data(), &[1, 2, 3]);

        let result = ClientId::from_opt61(12, &[1, 2, 3]);
        assert!(matches!(result, Err(Error::UnexpectedOptionCode(12))));
    }

    #[test]
    fn test_duid_iaid_layout() {
        let id = ClientId::from_duid_iaid(&[0xde, 0xad], [1, 2, 3, 4]);
        assert_eq!(id.data(), &[1, 2, 3, 4, 0xde, 0xad]);

        let other = ClientId::from_duid_iaid(&[0xde, 0xad], [4, 3, 2, 1]);
        assert_ne!(id, other);
    }

    #[test]
    fn test_usable_as_map_key() {
        let mut map = HashMap::new();
        map.insert(ClientId::from_hw_addr(&[1, 2, 3, 4, 5, 6]), "first");
        map.insert(ClientId::from_duid(&[1, 2, 3, 4, 5, 6]), "second");

        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&ClientId::from_hw_addr(&[1, 2, 3, 4, 5, 6])),
            Some(&"first")
        );
    }

    #[test]
    fn test_display_format() {
        let id = ClientId::from_hw_addr(&[0xaa, 0x0b, 0xcc]);
        assert_eq!(id.to_string(), "00:aa:0b:cc");

        let empty = ClientId::experimental(&[]);
        assert_eq!(empty.to_string(), "ff");
    }
}
