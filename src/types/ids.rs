// meridian_core/src/types/ids.rs
//
// Newtype identifiers. Plain `u64`s underneath, but distinct types so the
// compiler catches a `UserId` passed where an `OrderId` was expected.

use std::fmt;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(UserId);
id_type!(MarketId);
id_type!(OrderId);
id_type!(TradeId);
id_type!(TransactionId);
