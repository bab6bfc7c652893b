//! Connection profile: the YAML file the SDK is initialised from.
//!
//! Only the subset of the platform's profile format needed for bootstrap is
//! read; unknown keys are ignored so full profiles load unchanged.
//!
//! ```yaml
//! name: first-network
//! client:
//!   organization: org1
//! organizations:
//!   org1:
//!     mspid: Org1MSP
//!     peers: [peer0.org1.example.com]
//!     users: [Admin, User1]
//! orderers:
//!   orderer.example.com:
//!     url: grpcs://localhost:7050
//! peers:
//!   peer0.org1.example.com:
//!     url: grpcs://localhost:7051
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::PlatformError;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSection {
    pub organization: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub mspid: String,
    #[serde(default)]
    pub peers: Vec<String>,
    /// Enrolled users. Empty means the profile does not restrict users.
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default)]
    pub name: String,
    pub client: ClientSection,
    pub organizations: BTreeMap<String, Organization>,
    #[serde(default)]
    pub orderers: BTreeMap<String, Endpoint>,
    #[serde(default)]
    pub peers: BTreeMap<String, Endpoint>,
}

impl ConnectionProfile {
    pub fn from_file(path: &Path) -> Result<Self, PlatformError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PlatformError::Profile(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
            .map_err(|e| PlatformError::Profile(format!("{}: {e}", path.display())))
    }

    /// Parse and validate. Errors are bare messages; [`from_file`](Self::from_file)
    /// prefixes the path.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let profile: Self = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<(), String> {
        if self.organization(&self.client.organization).is_none() {
            return Err(format!(
                "client organization '{}' is not declared under organizations",
                self.client.organization
            ));
        }
        for (org_name, org) in &self.organizations {
            if org.mspid.trim().is_empty() {
                return Err(format!("organization '{org_name}' has an empty mspid"));
            }
            if let Some(peer) = org.peers.iter().find(|p| !self.peers.contains_key(*p)) {
                return Err(format!(
                    "organization '{org_name}' lists undeclared peer '{peer}'"
                ));
            }
        }
        if self.orderers.is_empty() {
            return Err("profile declares no orderers".into());
        }
        Ok(())
    }

    /// Look up an organization by name, ignoring ASCII case.
    pub fn organization(&self, name: &str) -> Option<(&str, &Organization)> {
        self.organizations
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn require_org(&self, name: &str) -> Result<(&str, &Organization), PlatformError> {
        self.organization(name)
            .ok_or_else(|| PlatformError::Identity(format!("unknown organization '{name}'")))
    }

    /// Check that `user` is enrolled in `org` and return the org's MSP id.
    pub fn require_user(&self, org: &str, user: &str) -> Result<&str, PlatformError> {
        let (org_name, o) = self.require_org(org)?;
        if !o.users.is_empty() && !o.users.iter().any(|u| u == user) {
            return Err(PlatformError::Identity(format!(
                "user '{user}' not found in organization '{org_name}'"
            )));
        }
        Ok(&o.mspid)
    }

    pub fn has_orderer(&self, id: &str) -> bool {
        self.orderers.contains_key(id)
    }

    /// MSP id of the client organization.
    pub fn client_msp(&self) -> Option<&str> {
        self.organization(&self.client.organization)
            .map(|(_, o)| o.mspid.as_str())
    }

    pub fn is_known_msp(&self, msp_id: &str) -> bool {
        self.organizations.values().any(|o| o.mspid == msp_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fixtures::PROFILE;

    #[test]
    fn parses_profile_and_ignores_unknown_keys() {
        let p = ConnectionProfile::from_yaml(PROFILE).unwrap();
        assert_eq!(p.name, "first-network");
        assert_eq!(p.client_msp(), Some("Org1MSP"));
        assert!(p.has_orderer("orderer.example.com"));
        assert!(p.is_known_msp("Org2MSP"));
        assert!(!p.is_known_msp("Org3MSP"));
    }

    #[test]
    fn organization_lookup_ignores_case() {
        let p = ConnectionProfile::from_yaml(PROFILE).unwrap();
        let (name, org) = p.organization("ORG1").unwrap();
        assert_eq!(name, "org1");
        assert_eq!(org.mspid, "Org1MSP");
    }

    #[test]
    fn require_user_checks_enrolment() {
        let p = ConnectionProfile::from_yaml(PROFILE).unwrap();
        assert_eq!(p.require_user("org1", "Admin").unwrap(), "Org1MSP");
        assert!(matches!(p.require_user("org1", "Mallory"), Err(PlatformError::Identity(_))));
        // org2 lists no users, so any name is accepted
        assert_eq!(p.require_user("org2", "Anyone").unwrap(), "Org2MSP");
        assert!(p.require_user("org9", "Admin").is_err());
    }

    #[test]
    fn rejects_undeclared_client_org() {
        let yaml = PROFILE.replace("organization: org1", "organization: org7");
        assert!(ConnectionProfile::from_yaml(&yaml).unwrap_err().contains("org7"));
    }

    #[test]
    fn rejects_undeclared_peer() {
        let yaml = PROFILE.replace("peers: [peer0.org2.example.com]", "peers: [ghost]");
        assert!(ConnectionProfile::from_yaml(&yaml).unwrap_err().contains("ghost"));
    }

    #[test]
    fn rejects_profile_without_orderers() {
        let yaml = PROFILE.replace(
            "orderers:\n  orderer.example.com:\n    url: grpcs://localhost:7050\n",
            "",
        );
        assert!(ConnectionProfile::from_yaml(&yaml).unwrap_err().contains("orderers"));
    }

    #[test]
    fn missing_file_is_profile_error() {
        let err = ConnectionProfile::from_file(Path::new("/nonexistent/profile.yaml")).unwrap_err();
        assert!(matches!(err, PlatformError::Profile(_)));
    }
}
