use std::collections::HashMap;

use crate::domain::order::identity::{CloudCredential, RequesterIdentity};
use crate::domain::utils::id::CloudName;
use crate::error::{CloudError, Result};

/// Maps the identity behind an order to the credential used on a cloud.
pub trait CredentialMapper: Send + Sync {
    fn map(&self, requester: &RequesterIdentity, cloud_name: &CloudName) -> Result<CloudCredential>;
}

/// Every requester acts through the single service credential configured for
/// each cloud.
#[derive(Debug, Default)]
pub struct ConfiguredCredentialMapper {
    credentials: HashMap<CloudName, CloudCredential>,
}

impl ConfiguredCredentialMapper {
    pub fn new(credentials: HashMap<CloudName, CloudCredential>) -> Self {
        ConfiguredCredentialMapper { credentials }
    }
}

impl CredentialMapper for ConfiguredCredentialMapper {
    fn map(&self, requester: &RequesterIdentity, cloud_name: &CloudName) -> Result<CloudCredential> {
        match self.credentials.get(cloud_name) {
            Some(credential) => Ok(credential.clone()),
            None => {
                log::warn!("No credential configured for cloud '{}' (requester {}).", cloud_name, requester.user_id);
                Err(CloudError::Unauthorized(format!("no credential for cloud '{}'", cloud_name)).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_cloud_is_unauthorized() {
        let mut credentials = HashMap::new();
        credentials.insert(CloudName::new("default"), CloudCredential::new("svc", "pw"));
        let mapper = ConfiguredCredentialMapper::new(credentials);
        let alice = RequesterIdentity::new("alice", "ldap", "token");

        assert_eq!(mapper.map(&alice, &CloudName::new("default")).unwrap().user, "svc");
        let err = mapper.map(&alice, &CloudName::new("other")).unwrap_err();
        assert!(matches!(err, crate::error::Error::Cloud(CloudError::Unauthorized(_))));
    }
}
