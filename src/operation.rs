// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Phase of the surrounding run.
///
/// Expansion itself only consumes a single flag, whether unknown
/// multiplicities are tolerated; [`OperationType::allows_unknown_instances`]
/// is the default mapping from phase to that flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationType {
    #[default]
    Invalid,
    Refresh,
    Plan,
    Apply,
}

impl OperationType {
    /// Validation-style passes (no concrete operation) defer expansion of
    /// unknown multiplicities. Refresh, plan and apply need concrete keys.
    pub fn allows_unknown_instances(&self) -> bool {
        matches!(self, OperationType::Invalid)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::Invalid => "OperationTypeInvalid",
            OperationType::Refresh => "OperationTypeRefresh",
            OperationType::Plan => "OperationTypePlan",
            OperationType::Apply => "OperationTypeApply",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(OperationType::default(), OperationType::Invalid);
        assert_eq!(OperationType::Plan.to_string(), "OperationTypePlan");
        assert!(OperationType::Invalid.allows_unknown_instances());
        assert!(!OperationType::Apply.allows_unknown_instances());
    }
}
