//! Strongly-typed identifiers for domain entities
//!
//! Plans, services, patients and tariffs are keyed by positive integers in
//! the systems that feed the coverage engine. Newtype wrappers keep a
//! `PlanId` from being passed where a `ServiceId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw value
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value
            pub const fn value(&self) -> i64 {
                self.0
            }

            /// Returns true if the identifier refers to a stored entity (> 0)
            pub const fn is_valid(&self) -> bool {
                self.0 > 0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(raw.parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }
    };
}

define_id!(PatientId, "PAT");
define_id!(PatientInsuranceId, "PINS");
define_id!(PlanId, "PLN");
define_id!(ServiceId, "SRV");
define_id!(ServiceCategoryId, "CAT");
define_id!(TariffId, "TRF");
define_id!(RuleId, "RUL");

impl ServiceId {
    /// Tariffs keyed by this id apply to every service of their plan
    pub const WILDCARD: ServiceId = ServiceId(0);

    /// Returns true for the wildcard service id
    pub const fn is_wildcard(&self) -> bool {
        self.0 == 0
    }
}
