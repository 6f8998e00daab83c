//! Identifier classification.
//!
//! Kinds are assigned in three passes, cheapest first: names that are
//! types by spelling, macros that are plain literals, and finally the
//! compiler-diagnostic probe for everything else.

pub mod classifier;
pub mod defines;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod kinds;

use anyhow::Result;

pub use classifier::{classifier_for, Classifier, ClangClassifier, Evidence, GccClassifier};
pub use kinds::{KindProber, ProbeOutcome};

use crate::builder::toolchain::Toolchain;
use crate::core::ident::{is_known_type_name, ForeignIdentifier, IdentKind, Resolved};
use crate::util::errors::BridgeError;

/// Give every identifier a terminal kind, or fail listing all that have none.
pub fn classify_identifiers(
    toolchain: &dyn Toolchain,
    cflags: &[String],
    preamble: &str,
    idents: &mut [ForeignIdentifier],
) -> Result<()> {
    for ident in idents.iter_mut() {
        if is_known_type_name(&ident.name) {
            ident.assign_kind(IdentKind::Type);
        }
    }

    let pending = |idents: &[ForeignIdentifier]| {
        idents
            .iter()
            .filter(|i| i.kind == IdentKind::Unknown)
            .count()
    };
    if pending(idents) == 0 {
        return Ok(());
    }

    let defines = defines::scan_defines(toolchain, cflags, preamble)?;
    for ident in idents.iter_mut().filter(|i| i.kind == IdentKind::Unknown) {
        if let Some((ty, value)) = defines
            .get(&ident.name)
            .and_then(|body| defines::literal_constant(body))
        {
            tracing::debug!("C.{} is a literal macro", ident.name);
            ident.assign_kind(IdentKind::Constant);
            ident.assign_resolution(Resolved::Constant { ty, value });
        }
    }

    let names: Vec<String> = idents
        .iter()
        .filter(|i| i.kind == IdentKind::Unknown)
        .map(|i| i.c_name.clone())
        .collect();
    if names.is_empty() {
        return Ok(());
    }

    let outcome = KindProber::new(toolchain, cflags.to_vec()).probe(preamble, &names)?;
    for ident in idents.iter_mut().filter(|i| i.kind == IdentKind::Unknown) {
        if let Some(kind) = outcome.kinds.get(&ident.c_name) {
            ident.assign_kind(*kind);
        }
    }

    let mut unresolved = outcome.unresolved;
    for ident in idents.iter().filter(|i| i.kind == IdentKind::Unknown) {
        if !unresolved.iter().any(|(n, _)| n == &ident.c_name) {
            unresolved.push((ident.name.clone(), "no diagnostic identified it".to_string()));
        }
    }
    if !unresolved.is_empty() {
        unresolved.sort();
        return Err(BridgeError::UnresolvedIdentifiers { names: unresolved }.into());
    }

    tracing::info!(
        "classified {} C identifier(s) ({} probed)",
        idents.len(),
        names.len()
    );
    Ok(())
}
