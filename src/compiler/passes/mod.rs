//! Built-in passes.
//!
//! - [`ToSsaPass`] / [`FromSsaPass`] - Conversion into and out of SSA form
//! - [`LicmPass`] - Loop-invariant code motion into synthesized preheaders
//!
//! Passes are selected by name through [`PassKind`].

mod licm;
mod ssa;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub use licm::{find_and_optimize_loops, HoistedInstruction, LicmPass, LicmReport};
pub use ssa::{FromSsaPass, ToSsaPass};

use crate::compiler::FunctionPass;

/// The built-in passes, parsed from selector names such as `"licm"` or `"to_ssa"`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Convert into SSA form.
    #[strum(to_string = "to_ssa", serialize = "ssa")]
    ToSsa,
    /// Convert out of SSA form.
    FromSsa,
    /// Loop-invariant code motion.
    Licm,
}

impl PassKind {
    /// Creates the pass.
    #[must_use]
    pub fn create(self) -> Box<dyn FunctionPass> {
        match self {
            PassKind::ToSsa => Box::new(ToSsaPass::new()),
            PassKind::FromSsa => Box::new(FromSsaPass::new()),
            PassKind::Licm => Box::new(LicmPass::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_selector_names() {
        assert_eq!("licm".parse::<PassKind>().unwrap(), PassKind::Licm);
        assert_eq!("ssa".parse::<PassKind>().unwrap(), PassKind::ToSsa);
        assert_eq!("to_ssa".parse::<PassKind>().unwrap(), PassKind::ToSsa);
        assert_eq!("from_ssa".parse::<PassKind>().unwrap(), PassKind::FromSsa);
        assert!("lvn".parse::<PassKind>().is_err());
    }

    #[test]
    fn test_created_pass_names_match_selectors() {
        for kind in PassKind::iter() {
            assert_eq!(kind.create().name(), kind.to_string());
        }
    }
}
