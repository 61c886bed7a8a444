//! Role-invariant check applied before trust is rotated.

use crate::error::{OcpiError, OcpiResult};
use crate::types::CredentialsRole;

/// Returned roles must pair 1:1 with the known roles by
/// (country code, party id, role). Business details may differ.
pub(crate) fn validate_roles(
    known: &[CredentialsRole],
    returned: &[CredentialsRole],
) -> OcpiResult<()> {
    if known.len() != returned.len() {
        return Err(OcpiError::Validation {
            message: format!(
                "party declared {} roles, {} were known",
                returned.len(),
                known.len()
            ),
        });
    }

    let mut unmatched: Vec<&CredentialsRole> = known.iter().collect();
    for role in returned {
        match unmatched.iter().position(|k| k.same_identity(role)) {
            Some(idx) => {
                unmatched.swap_remove(idx);
            }
            None => {
                return Err(OcpiError::Validation {
                    message: format!("role {} does not match any known role", role),
                })
            }
        }
    }

    Ok(())
}
