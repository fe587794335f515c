//! Attribute snapshot provider.
//!
//! The engine never owns attribute storage. Callers fetch owned snapshots
//! through this trait before evaluation; any I/O happens here, never inside
//! [`evaluate`](crate::evaluate).

use std::sync::Arc;

use bankguard_types::{AccountId, PrincipalId};

use crate::attributes::{PrincipalAttributes, ResourceAttributes};
use crate::error::Result;

/// Supplies immutable attribute snapshots for a decision request.
///
/// # Errors
///
/// Implementations return [`AuthzError::PrincipalNotFound`] or
/// [`AuthzError::ResourceNotFound`] for unknown IDs, and
/// [`AuthzError::ProviderUnavailable`] when the backing store cannot be read.
///
/// [`AuthzError::PrincipalNotFound`]: crate::AuthzError::PrincipalNotFound
/// [`AuthzError::ResourceNotFound`]: crate::AuthzError::ResourceNotFound
/// [`AuthzError::ProviderUnavailable`]: crate::AuthzError::ProviderUnavailable
pub trait AttributeProvider {
    fn principal(&self, id: &PrincipalId) -> Result<PrincipalAttributes>;

    fn resource(&self, id: &AccountId) -> Result<ResourceAttributes>;
}

impl<P: AttributeProvider + ?Sized> AttributeProvider for &P {
    fn principal(&self, id: &PrincipalId) -> Result<PrincipalAttributes> {
        (**self).principal(id)
    }

    fn resource(&self, id: &AccountId) -> Result<ResourceAttributes> {
        (**self).resource(id)
    }
}

impl<P: AttributeProvider + ?Sized> AttributeProvider for Arc<P> {
    fn principal(&self, id: &PrincipalId) -> Result<PrincipalAttributes> {
        (**self).principal(id)
    }

    fn resource(&self, id: &AccountId) -> Result<ResourceAttributes> {
        (**self).resource(id)
    }
}
