//! Built-in checks

mod form_list_ref;
mod self_reference;

pub use form_list_ref::{lists_identity_field, FormListFieldRefNotAdded};
pub use self_reference::{SelfReference, PARAM_CHECK_ONLY_EXISTING_FORM_PROPERTIES};

use crate::check::Check;
use crate::config::IdentityConfig;
use std::sync::Arc;

/// Identifiers of the built-in checks
pub mod ids {
    pub use super::form_list_ref::CHECK_ID as FORM_LIST_FIELD_REF_NOT_ADDED;
    pub use super::self_reference::CHECK_ID as SELF_REFERENCE;
}

/// All built-in checks, configured with the given identity spellings
pub fn builtin_checks(identity: &IdentityConfig) -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(FormListFieldRefNotAdded::new(
            identity.matcher(),
            &identity.schema_field(),
        )),
        Arc::new(SelfReference::new()),
    ]
}
