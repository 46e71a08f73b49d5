use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the resolver registry treats two applicable resolvers of equal
/// priority.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ResolverConflictPolicy {
    /// Report the ambiguity as a registration error.
    #[default]
    Reject,
    /// Use the entry registered first and ignore the rest.
    FirstRegisteredWins,
}
