use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::bytes;

use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;

/// A Windows security identifier, decoded from its binary form.
#[derive(PartialEq, Eq, Hash, Clone)]
pub struct Sid {
    revision: u8,
    // 48-bit, stored big-endian on disk.
    identifier_authority: u64,
    sub_authorities: Vec<u32>,
}

impl Sid {
    pub fn from_bytes(data: &[u8]) -> DeserializationResult<Sid> {
        let revision = bytes::read_array_r::<1>(data, 0, "sid revision")?[0];
        let sub_count = bytes::read_array_r::<1>(data, 1, "sid sub authority count")?[0];
        let authority = bytes::read_array_r::<6>(data, 2, "sid identifier authority")?;

        let identifier_authority = authority
            .iter()
            .fold(0_u64, |acc, &b| (acc << 8) | u64::from(b));

        let needed = 8 + usize::from(sub_count) * 4;
        if data.len() < needed {
            return Err(DeserializationError::Truncated {
                what: "sid sub authorities",
                offset: 8,
                need: needed - 8,
                have: data.len().saturating_sub(8),
            });
        }

        let sub_authorities = (0..usize::from(sub_count))
            .map(|i| bytes::read_u32_le_r(data, 8 + i * 4, "sid sub authority"))
            .collect::<DeserializationResult<Vec<u32>>>()?;

        Ok(Sid {
            revision,
            identifier_authority,
            sub_authorities,
        })
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn identifier_authority(&self) -> u64 {
        self.identifier_authority
    }

    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.identifier_authority)?;

        for element in self.sub_authorities.iter() {
            write!(f, "-{}", element)?;
        }

        Ok(())
    }
}

impl Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
