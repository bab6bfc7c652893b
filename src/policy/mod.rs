//! Signature-policy expressions.
//!
//! Compiles the platform's policy grammar (`AND(...)`, `OR(...)`,
//! `OutOf(n, ...)` over `'MSPID.role'` principals) into a
//! [`SignaturePolicyEnvelope`], and renders envelopes back into the same
//! grammar through `Display`.
//!
//! ```text
//! OR('Org1MSP.member', AND('Org2MSP.peer', 'Org3MSP.admin'))
//! ```

mod parser;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("policy expression is empty")]
    Empty,
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("expected {expected} at offset {offset}, found {found}")]
    Expected {
        expected: &'static str,
        found: String,
        offset: usize,
    },
    #[error("unknown gate '{name}' at offset {offset} (expected AND, OR or OutOf)")]
    UnknownGate { name: String, offset: usize },
    #[error("invalid principal '{principal}' at offset {offset}: {reason}")]
    InvalidPrincipal {
        principal: String,
        reason: String,
        offset: usize,
    },
    #[error("OutOf threshold {n} is outside 1..={count}")]
    Threshold { n: u32, count: usize },
    #[error("a policy must start with AND, OR or OutOf, not a bare principal")]
    BarePrincipal,
    #[error("gates nest deeper than {max} levels at offset {offset}")]
    TooDeep { max: usize, offset: usize },
}

// ── Principals ────────────────────────────────────────────────────────────────

/// Role an identity must hold within its MSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MspRole {
    Member,
    Admin,
    Client,
    Peer,
    Orderer,
}

impl MspRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MspRole::Member => "member",
            MspRole::Admin => "admin",
            MspRole::Client => "client",
            MspRole::Peer => "peer",
            MspRole::Orderer => "orderer",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(MspRole::Member),
            "admin" => Some(MspRole::Admin),
            "client" => Some(MspRole::Client),
            "peer" => Some(MspRole::Peer),
            "orderer" => Some(MspRole::Orderer),
            _ => None,
        }
    }
}

/// An MSP identifier paired with the role a signer must hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MspPrincipal {
    pub msp_id: String,
    pub role: MspRole,
}

impl MspPrincipal {
    pub fn member(msp_id: impl Into<String>) -> Self {
        Self { msp_id: msp_id.into(), role: MspRole::Member }
    }
}

impl fmt::Display for MspPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}.{}'", self.msp_id, self.role.as_str())
    }
}

// ── Policy tree ───────────────────────────────────────────────────────────────

/// Signature rule: either a single identity (by index into the envelope's
/// identity list) or a threshold over nested rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignaturePolicy {
    SignedBy(u32),
    NOutOf { n: u32, rules: Vec<SignaturePolicy> },
}

/// Compiled policy as handed to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePolicyEnvelope {
    pub version: u32,
    pub rule: SignaturePolicy,
    pub identities: Vec<MspPrincipal>,
}

impl SignaturePolicyEnvelope {
    /// Compile a policy expression.
    pub fn from_expression(expr: &str) -> Result<Self, PolicyError> {
        parser::parse(expr)
    }

    /// MSP ids referenced by this envelope, in identity order, without repeats.
    pub fn msp_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for p in &self.identities {
            if !ids.contains(&p.msp_id.as_str()) {
                ids.push(&p.msp_id);
            }
        }
        ids
    }

    fn write_rule(&self, rule: &SignaturePolicy, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match rule {
            SignaturePolicy::SignedBy(idx) => match self.identities.get(*idx as usize) {
                Some(p) => write!(f, "{p}"),
                None => write!(f, "'<missing identity {idx}>'"),
            },
            SignaturePolicy::NOutOf { n, rules } => {
                let count = rules.len();
                if *n == 1 {
                    f.write_str("OR(")?;
                } else if *n as usize == count {
                    f.write_str("AND(")?;
                } else {
                    write!(f, "OutOf({n}, ")?;
                }
                for (i, r) in rules.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    self.write_rule(r, f)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for SignaturePolicyEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_rule(&self.rule, f)
    }
}

impl FromStr for SignaturePolicyEnvelope {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_expression(s)
    }
}

/// Policy satisfied by a signature from any member of any of `msp_ids`.
pub fn signed_by_any_member<S: AsRef<str>>(msp_ids: &[S]) -> SignaturePolicyEnvelope {
    let identities: Vec<MspPrincipal> = msp_ids
        .iter()
        .map(|id| MspPrincipal::member(id.as_ref()))
        .collect();
    let rules = (0..identities.len() as u32).map(SignaturePolicy::SignedBy).collect();
    SignaturePolicyEnvelope {
        version: 0,
        rule: SignaturePolicy::NOutOf { n: 1, rules },
        identities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_single_member_matches_signed_by_any_member() {
        let compiled: SignaturePolicyEnvelope = "OR('Org1MSP.member')".parse().unwrap();
        assert_eq!(compiled, signed_by_any_member(&["Org1MSP"]));
    }

    #[test]
    fn and_compiles_to_full_threshold() {
        let env = SignaturePolicyEnvelope::from_expression("AND('A.peer', 'B.admin')").unwrap();
        assert_eq!(
            env.rule,
            SignaturePolicy::NOutOf {
                n: 2,
                rules: vec![SignaturePolicy::SignedBy(0), SignaturePolicy::SignedBy(1)],
            }
        );
        assert_eq!(env.identities[1], MspPrincipal { msp_id: "B".into(), role: MspRole::Admin });
    }

    #[test]
    fn display_renders_nested_gates() {
        let src = "OR('Org1MSP.member', AND('Org2MSP.peer', 'Org3MSP.admin'))";
        let env = SignaturePolicyEnvelope::from_expression(src).unwrap();
        assert_eq!(env.to_string(), src);
    }

    #[test]
    fn display_uses_out_of_for_partial_thresholds() {
        let env = SignaturePolicyEnvelope::from_expression(
            "OutOf(2, 'A.member', 'B.member', 'C.member')",
        )
        .unwrap();
        assert_eq!(env.to_string(), "OutOf(2, 'A.member', 'B.member', 'C.member')");
    }

    #[test]
    fn rendering_reparses_to_same_envelope() {
        for src in [
            "AND('Org1MSP.member')",
            "or(\"Org1MSP.client\", 'Org2.orderer')",
            "OutOf(1, 'A.member', OutOf(2, 'B.peer', 'C.peer', 'D.peer'))",
        ] {
            let env = SignaturePolicyEnvelope::from_expression(src).unwrap();
            let again = SignaturePolicyEnvelope::from_expression(&env.to_string()).unwrap();
            assert_eq!(env, again, "round trip of {src}");
        }
    }

    #[test]
    fn msp_ids_are_deduplicated_in_order() {
        let env = SignaturePolicyEnvelope::from_expression(
            "OR('B.member', 'A.peer', 'B.admin')",
        )
        .unwrap();
        assert_eq!(env.identities.len(), 3);
        assert_eq!(env.msp_ids(), vec!["B", "A"]);
    }

    #[test]
    fn signed_by_any_member_covers_each_msp() {
        let env = signed_by_any_member(&["Org1MSP", "Org2MSP"]);
        assert_eq!(env.to_string(), "OR('Org1MSP.member', 'Org2MSP.member')");
    }
}
