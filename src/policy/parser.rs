//! Tokenizer and recursive-descent parser for policy expressions.

use super::{MspPrincipal, MspRole, PolicyError, SignaturePolicy, SignaturePolicyEnvelope};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(u32),
    LParen,
    RParen,
    Comma,
    End,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("identifier '{s}'"),
            Tok::Str(s) => format!("string '{s}'"),
            Tok::Int(n) => format!("integer {n}"),
            Tok::LParen => "'('".into(),
            Tok::RParen => "')'".into(),
            Tok::Comma => "','".into(),
            Tok::End => "end of input".into(),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(Tok, usize)>, PolicyError> {
    let mut out = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(at, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                out.push((Tok::LParen, at));
            }
            ')' => {
                chars.next();
                out.push((Tok::RParen, at));
            }
            ',' => {
                chars.next();
                out.push((Tok::Comma, at));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, ch)) if ch == quote => break,
                        Some((_, ch)) => s.push(ch),
                        None => return Err(PolicyError::UnterminatedString { offset: at }),
                    }
                }
                out.push((Tok::Str(s), at));
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    s.push(d);
                    chars.next();
                }
                let n = s.parse::<u32>().map_err(|_| PolicyError::Expected {
                    expected: "a 32-bit threshold",
                    found: s.clone(),
                    offset: at,
                })?;
                out.push((Tok::Int(n), at));
            }
            c if c.is_ascii_alphabetic() => {
                let mut s = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if !d.is_ascii_alphanumeric() && d != '_' {
                        break;
                    }
                    s.push(d);
                    chars.next();
                }
                out.push((Tok::Ident(s), at));
            }
            other => return Err(PolicyError::UnexpectedChar { found: other, offset: at }),
        }
    }

    out.push((Tok::End, src.len()));
    Ok(out)
}

/// Deepest gate nesting accepted before parsing gives up.
const MAX_DEPTH: usize = 64;

struct Parser {
    toks: Vec<(Tok, usize)>,
    pos: usize,
    depth: usize,
    identities: Vec<MspPrincipal>,
}

impl Parser {
    fn peek(&self) -> &(Tok, usize) {
        // tokenize always terminates the stream with End
        &self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn bump(&mut self) -> (Tok, usize) {
        let t = self.peek().clone();
        if self.pos < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, want: Tok, expected: &'static str) -> Result<(), PolicyError> {
        let (tok, offset) = self.bump();
        if tok == want {
            Ok(())
        } else {
            Err(PolicyError::Expected { expected, found: tok.describe(), offset })
        }
    }

    fn gate(&mut self, name: &str, offset: usize) -> Result<SignaturePolicy, PolicyError> {
        if self.depth >= MAX_DEPTH {
            return Err(PolicyError::TooDeep { max: MAX_DEPTH, offset });
        }
        self.depth += 1;
        let gate = self.gate_body(name, offset);
        self.depth -= 1;
        gate
    }

    fn gate_body(&mut self, name: &str, offset: usize) -> Result<SignaturePolicy, PolicyError> {
        self.expect(Tok::LParen, "'('")?;

        let threshold = match name.to_ascii_lowercase().as_str() {
            "and" => None,
            "or" => Some(1),
            "outof" => {
                let (tok, at) = self.bump();
                let n = match tok {
                    Tok::Int(n) => n,
                    other => {
                        return Err(PolicyError::Expected {
                            expected: "threshold",
                            found: other.describe(),
                            offset: at,
                        });
                    }
                };
                self.expect(Tok::Comma, "','")?;
                Some(n)
            }
            _ => return Err(PolicyError::UnknownGate { name: name.to_string(), offset }),
        };

        let mut rules = vec![self.expr()?];
        loop {
            match self.bump() {
                (Tok::Comma, _) => rules.push(self.expr()?),
                (Tok::RParen, _) => break,
                (tok, at) => {
                    return Err(PolicyError::Expected {
                        expected: "',' or ')'",
                        found: tok.describe(),
                        offset: at,
                    });
                }
            }
        }

        let n = threshold.unwrap_or(rules.len() as u32);
        if n == 0 || n as usize > rules.len() {
            return Err(PolicyError::Threshold { n, count: rules.len() });
        }
        Ok(SignaturePolicy::NOutOf { n, rules })
    }

    fn expr(&mut self) -> Result<SignaturePolicy, PolicyError> {
        match self.bump() {
            (Tok::Ident(name), at) => self.gate(&name, at),
            (Tok::Str(s), at) => self.principal(&s, at),
            (tok, at) => Err(PolicyError::Expected {
                expected: "gate or principal",
                found: tok.describe(),
                offset: at,
            }),
        }
    }

    fn principal(&mut self, raw: &str, offset: usize) -> Result<SignaturePolicy, PolicyError> {
        let invalid = |reason: &str| PolicyError::InvalidPrincipal {
            principal: raw.to_string(),
            reason: reason.to_string(),
            offset,
        };

        let (msp_id, role) = raw.rsplit_once('.').ok_or_else(|| invalid("expected MSPID.role"))?;
        if msp_id.is_empty() {
            return Err(invalid("empty MSP id"));
        }
        if !msp_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
            return Err(invalid("MSP id may only contain letters, digits, '.' and '-'"));
        }
        let role = MspRole::parse(role)
            .ok_or_else(|| invalid("role must be member, admin, client, peer or orderer"))?;

        let idx = self.identities.len() as u32;
        self.identities.push(MspPrincipal { msp_id: msp_id.to_string(), role });
        Ok(SignaturePolicy::SignedBy(idx))
    }
}

pub(super) fn parse(src: &str) -> Result<SignaturePolicyEnvelope, PolicyError> {
    if src.trim().is_empty() {
        return Err(PolicyError::Empty);
    }

    let mut p = Parser { toks: tokenize(src)?, pos: 0, depth: 0, identities: Vec::new() };
    if matches!(p.peek().0, Tok::Str(_)) {
        return Err(PolicyError::BarePrincipal);
    }

    let rule = p.expr()?;
    let (tok, offset) = p.bump();
    if tok != Tok::End {
        return Err(PolicyError::Expected {
            expected: "end of input",
            found: tok.describe(),
            offset,
        });
    }

    Ok(SignaturePolicyEnvelope { version: 0, rule, identities: p.identities })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_free_text() {
        let err = parse("not-a-real-policy").unwrap_err();
        assert_eq!(err, PolicyError::UnexpectedChar { found: '-', offset: 3 });
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse("   ").unwrap_err(), PolicyError::Empty);
    }

    #[test]
    fn rejects_unknown_gate() {
        assert!(matches!(
            parse("XOR('A.member')").unwrap_err(),
            PolicyError::UnknownGate { name, offset: 0 } if name == "XOR"
        ));
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(matches!(
            parse("OR('Org1MSP.superuser')").unwrap_err(),
            PolicyError::InvalidPrincipal { .. }
        ));
    }

    #[test]
    fn rejects_principal_without_role() {
        assert!(matches!(
            parse("OR('Org1MSP')").unwrap_err(),
            PolicyError::InvalidPrincipal { .. }
        ));
    }

    #[test]
    fn rejects_bare_principal() {
        assert_eq!(parse("'Org1MSP.member'").unwrap_err(), PolicyError::BarePrincipal);
    }

    #[test]
    fn rejects_threshold_above_count() {
        assert_eq!(
            parse("OutOf(3, 'A.member', 'B.member')").unwrap_err(),
            PolicyError::Threshold { n: 3, count: 2 }
        );
        assert_eq!(
            parse("OutOf(0, 'A.member')").unwrap_err(),
            PolicyError::Threshold { n: 0, count: 1 }
        );
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(matches!(
            parse("OR('A.member'))").unwrap_err(),
            PolicyError::Expected { expected: "end of input", .. }
        ));
    }

    #[test]
    fn rejects_unterminated_string() {
        assert_eq!(
            parse("OR('A.member)").unwrap_err(),
            PolicyError::UnterminatedString { offset: 3 }
        );
    }

    #[test]
    fn msp_ids_may_contain_dots_and_dashes() {
        let env = parse("AND('org-1.example.com.peer')").unwrap();
        assert_eq!(env.identities[0].msp_id, "org-1.example.com");
        assert_eq!(env.identities[0].role, MspRole::Peer);
    }

    #[test]
    fn gate_names_are_case_insensitive() {
        assert!(parse("outof(1, 'A.member')").is_ok());
        assert!(parse("OUTOF(1, 'A.member')").is_ok());
        assert!(parse("and('A.member')").is_ok());
    }

    #[test]
    fn identities_follow_appearance_order() {
        let env = parse("AND(OR('A.member', 'B.member'), 'A.member')").unwrap();
        let ids: Vec<_> = env.identities.iter().map(|p| p.msp_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "A"]);
    }

    fn nested_or(depth: usize) -> String {
        format!("{}'A.member'{}", "OR(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn deeply_nested_gates_are_rejected() {
        assert_eq!(
            parse(&nested_or(10_000)).unwrap_err(),
            PolicyError::TooDeep { max: MAX_DEPTH, offset: MAX_DEPTH * 3 }
        );
    }

    #[test]
    fn nesting_up_to_the_limit_is_accepted() {
        let env = parse(&nested_or(MAX_DEPTH)).unwrap();
        assert_eq!(env.identities.len(), 1);
        assert!(matches!(
            parse(&nested_or(MAX_DEPTH + 1)).unwrap_err(),
            PolicyError::TooDeep { .. }
        ));
    }
}
