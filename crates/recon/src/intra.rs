use std::collections::BTreeMap;

use crate::model::{AuxTable, Diagnostic, Group};
use crate::registry::EquivalenceRegistry;

/// Union the groups of one source that share an alias or contact URL.
///
/// For each signal value reported by two or more keys, the anchor (smallest
/// member) of the first key's group is unioned with the anchor of every
/// other key's group. `groups` is the source's effective membership after
/// in-source dedup. Returns the number of classes joined.
pub fn merge_secondary_signals(
    source: &str,
    aux: &[AuxTable],
    groups: &BTreeMap<String, Group>,
    registry: &mut EquivalenceRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let mut joins = 0;

    for table in aux {
        for (value, keys) in table.shared() {
            let mut first_anchor = None;
            for key in keys {
                let anchor = match groups.get(key) {
                    Some(group) => group.first().copied(),
                    None => {
                        log::warn!("{source}: {} '{value}' references unknown group '{key}'", table.signal);
                        diagnostics.push(Diagnostic::UnknownSignalKey {
                            source: source.to_string(),
                            signal: table.signal,
                            value: value.to_string(),
                            key: key.clone(),
                        });
                        continue;
                    }
                };
                // Emptied groups were reported when seeding.
                let Some(anchor) = anchor else { continue };

                match first_anchor {
                    None => first_anchor = Some(anchor),
                    Some(first) => {
                        if registry.union(first, anchor) {
                            log::debug!(
                                "{source}: {} '{value}' joined AS{first} and AS{anchor}",
                                table.signal
                            );
                            joins += 1;
                        }
                    }
                }
            }
        }
    }

    joins
}
