//! Directory queries run before an account is created.

use crate::client::{DirectorySession, LdapEntry, SearchScope};
use crate::dn::DistinguishedName;
use crate::filter::escape_filter_value;
use crate::Result;
use adduser_core::Error;
use tracing::{debug, warn};

/// Filter matching every entry that carries a uid number.
pub const UID_NUMBER_FILTER: &str = "(uidnumber=*)";

const UID_NUMBER: &str = "uidNumber";
// RFC 4511 "no attributes" selector.
const NO_ATTRIBUTES: &[&str] = &["1.1"];

/// Returns the next free uid number below `base_dn`: one more than the highest in use, or 1.
///
/// # Errors
///
/// Propagates search failures. Returns [`Error::IdentifierExhausted`] when the highest uid
/// number in use is `u32::MAX`.
pub fn next_uid_number(
    session: &mut dyn DirectorySession,
    base_dn: &DistinguishedName,
) -> Result<u32> {
    let entries = session.search(
        base_dn.as_str(),
        SearchScope::Subtree,
        UID_NUMBER_FILTER,
        &[UID_NUMBER],
    )?;

    let highest = highest_uid_number(&entries);
    let next = highest
        .checked_add(1)
        .ok_or(Error::IdentifierExhausted(highest))?;
    debug!(highest, next, "Highest uid");
    Ok(next)
}

/// Highest uid number carried by `entries`, 0 if none. Values that do not parse are skipped.
#[must_use]
pub fn highest_uid_number(entries: &[LdapEntry]) -> u32 {
    entries
        .iter()
        .flat_map(|entry| {
            entry
                .values(UID_NUMBER)
                .unwrap_or_default()
                .iter()
                .filter_map(move |value| match value.trim().parse::<u32>() {
                    Ok(number) => Some(number),
                    Err(_) => {
                        warn!(dn = %entry.dn, value = %value, "ignoring non-numeric uidNumber");
                        None
                    }
                })
        })
        .max()
        .unwrap_or(0)
}

/// Filter selecting the POSIX account named `candidate`.
#[must_use]
pub fn account_filter(rdn_attribute: &str, candidate: &str) -> String {
    format!(
        "(&(objectClass=posixAccount)({rdn_attribute}={}))",
        escape_filter_value(candidate)
    )
}

/// Returns true if a POSIX account whose `rdn_attribute` equals `candidate` exists below
/// `base_dn`.
///
/// # Errors
///
/// Propagates search failures.
pub fn account_exists(
    session: &mut dyn DirectorySession,
    base_dn: &DistinguishedName,
    rdn_attribute: &str,
    candidate: &str,
) -> Result<bool> {
    let filter = account_filter(rdn_attribute, candidate);
    let entries = session.search(
        base_dn.as_str(),
        SearchScope::Subtree,
        &filter,
        NO_ATTRIBUTES,
    )?;
    debug!(filter = %filter, matches = entries.len(), "existence check");
    Ok(!entries.is_empty())
}
