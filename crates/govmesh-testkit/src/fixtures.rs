//! Governance framework fixtures
//!
//! Raw JSON, so the testkit does not depend on the governance crate.

use serde_json::Value;

/// Framework with an `and` over two schemas (`trader`), an identity rule
/// (`licenser`) and a cred-def rule (`exporter`).
pub const TRADE_FRAMEWORK: &str = include_str!("fixtures/trade_framework.json");

/// Framework with single-condition `and` (`trader`) and `any`
/// (`dual_purpose_cargo_licenser`) rules.
pub const BORDER_FRAMEWORK: &str = include_str!("fixtures/border_framework.json");

/// Schema ids used by [`TRADE_FRAMEWORK`].
pub mod trade {
    /// Trade licence schema
    pub const TRADE_SCHEMA: &str = "Gk6YNB9x5w6FwhNBUKjUEY:2:Trade-License:1.0";
    /// Tax payer schema
    pub const TAX_SCHEMA: &str = "9MG2vmFLem8p4VBmcu3DRV:2:Tax-Payer:1.0";
    /// Bare DID of the trade ministry
    pub const TRADE_MINISTRY: &str = "Gk6YNB9x5w6FwhNBUKjUEY";
    /// Bare DID of the tax office
    pub const TAX_OFFICE: &str = "9MG2vmFLem8p4VBmcu3DRV";
    /// Bare DID granted `licenser` by identity
    pub const MANUFACTURER: &str = "Hzp6tiXwVbTwdU8eRWiN2M";
    /// Exporter credential definition
    pub const EXPORTER_CRED_DEF: &str = "Gk6YNB9x5w6FwhNBUKjUEY:3:CL:8974:EXPORTER";
}

/// Schema ids used by [`BORDER_FRAMEWORK`].
pub mod border {
    /// Trading licence schema
    pub const TRADE_SCHEMA: &str = "HahGzAQHe413h6np218TEx:2:Trading License:1.0";
    /// Bare DID of the trade ministry
    pub const TRADE_MINISTRY: &str = "HahGzAQHe413h6np218TEx";
}

/// [`TRADE_FRAMEWORK`] as a JSON value.
pub fn trade_framework() -> Value {
    serde_json::from_str(TRADE_FRAMEWORK).unwrap_or(Value::Null)
}

/// [`BORDER_FRAMEWORK`] as a JSON value.
pub fn border_framework() -> Value {
    serde_json::from_str(BORDER_FRAMEWORK).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_valid_json() {
        assert!(trade_framework().is_object());
        assert!(border_framework().is_object());
        assert_eq!(trade_framework()["permissions"].as_array().map(Vec::len), Some(3));
    }
}
