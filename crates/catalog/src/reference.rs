//! Reference expressions and interpolation templates.
//!
//! A reference addresses another entity and, optionally, an attribute path
//! inside it:
//!
//! ```text
//! aws_iam_role.node.arn
//! data.aws_iam_policy_document.assume.json
//! aws_subnet.private.ids.0
//! ```
//!
//! Templates are text with `${...}` interpolations. They are split into
//! literal and reference parts once, at load time, so nothing downstream
//! ever scans opaque strings for references.

use crate::error::ReferenceSyntaxError;
use crate::types::{EntityId, EntityKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Identifier segment: entity types, names and attribute names
static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("identifier pattern is valid")
});

/// Attribute path segment: identifier or list index
static PATH_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_-]*|[0-9]+)$").expect("path segment pattern is valid")
});

/// A reference to another entity's id and an attribute path within it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub target: EntityId,
    #[serde(default)]
    pub path: Vec<String>,
}

impl Reference {
    pub fn new(target: EntityId, path: Vec<String>) -> Self {
        Self { target, path }
    }

    /// Parse a reference expression like `type.name.attr` or `data.type.name`
    pub fn parse(text: &str) -> Result<Self, ReferenceSyntaxError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ReferenceSyntaxError::Empty);
        }

        let segments: Vec<&str> = text.split('.').collect();
        let (kind, rest) = match segments.first() {
            Some(&"data") => (EntityKind::Data, &segments[1..]),
            _ => (EntityKind::Resource, &segments[..]),
        };

        if rest.len() < 2 {
            return Err(ReferenceSyntaxError::TooShort { found: rest.len() });
        }

        for segment in &rest[..2] {
            if !IDENT_RE.is_match(segment) {
                return Err(ReferenceSyntaxError::InvalidSegment {
                    segment: (*segment).to_string(),
                });
            }
        }
        for segment in &rest[2..] {
            if !PATH_SEGMENT_RE.is_match(segment) {
                return Err(ReferenceSyntaxError::InvalidSegment {
                    segment: (*segment).to_string(),
                });
            }
        }

        Ok(Self::new(
            EntityId::new(kind, rest[0], rest[1]),
            rest[2..].iter().map(|s| (*s).to_string()).collect(),
        ))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

/// One piece of an interpolated string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplatePart {
    Literal(String),
    Ref(Reference),
}

/// Split `text` into literal runs and `${...}` references.
///
/// `$${` is an escape for a literal `${`. Adjacent literal runs are merged.
pub fn parse_template(text: &str) -> Result<Vec<TemplatePart>, ReferenceSyntaxError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = text;
    let mut consumed = 0;

    while let Some(pos) = rest.find("${") {
        // "$${" escapes the interpolation
        if pos > 0 && rest.as_bytes()[pos - 1] == b'$' {
            literal.push_str(&rest[..pos - 1]);
            literal.push_str("${");
            rest = &rest[pos + 2..];
            consumed += pos + 2;
            continue;
        }

        literal.push_str(&rest[..pos]);
        let after_open = &rest[pos + 2..];
        let close = after_open
            .find('}')
            .ok_or(ReferenceSyntaxError::Unterminated {
                offset: consumed + pos,
            })?;

        let reference = Reference::parse(&after_open[..close])?;
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
        }
        parts.push(TemplatePart::Ref(reference));

        consumed += pos + 2 + close + 1;
        rest = &after_open[close + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_reference() {
        let r = Reference::parse("aws_iam_role.node.arn").unwrap();
        assert_eq!(r.target, EntityId::resource("aws_iam_role", "node"));
        assert_eq!(r.path, vec!["arn".to_string()]);
    }

    #[test]
    fn test_parse_data_reference() {
        let r = Reference::parse("data.aws_iam_policy_document.assume.json").unwrap();
        assert_eq!(r.target, EntityId::data("aws_iam_policy_document", "assume"));
        assert_eq!(r.path, vec!["json".to_string()]);
    }

    #[test]
    fn test_parse_whole_entity_and_index_path() {
        let r = Reference::parse("aws_vpc.main").unwrap();
        assert!(r.path.is_empty());

        let r = Reference::parse("aws_subnet.private.ids.0").unwrap();
        assert_eq!(r.path, vec!["ids".to_string(), "0".to_string()]);
    }

    #[test]
    fn test_parse_rejects_short_and_invalid() {
        assert_eq!(Reference::parse("  "), Err(ReferenceSyntaxError::Empty));
        assert_eq!(
            Reference::parse("aws_vpc"),
            Err(ReferenceSyntaxError::TooShort { found: 1 })
        );
        assert_eq!(
            Reference::parse("data.aws_ami"),
            Err(ReferenceSyntaxError::TooShort { found: 1 })
        );
        assert_eq!(
            Reference::parse("aws_vpc..id"),
            Err(ReferenceSyntaxError::InvalidSegment {
                segment: String::new()
            })
        );
        assert_eq!(
            Reference::parse("aws_vpc.9main"),
            Err(ReferenceSyntaxError::InvalidSegment {
                segment: "9main".to_string()
            })
        );
        assert!(Reference::parse("aws_vpc.main.id!").is_err());
    }

    #[test]
    fn test_display_round_trips_text() {
        for text in ["aws_vpc.main", "data.aws_ami.ecs.id", "aws_subnet.a.ids.0"] {
            assert_eq!(Reference::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_template_splits_literals_and_refs() {
        let parts =
            parse_template("echo ECS_CLUSTER=${aws_ecs_cluster.main.name} >> /etc/ecs/ecs.config")
                .unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], TemplatePart::Literal("echo ECS_CLUSTER=".into()));
        assert_eq!(
            parts[1],
            TemplatePart::Ref(Reference::parse("aws_ecs_cluster.main.name").unwrap())
        );
        assert_eq!(parts[2], TemplatePart::Literal(" >> /etc/ecs/ecs.config".into()));
    }

    #[test]
    fn test_template_escape_and_plain_text() {
        assert_eq!(
            parse_template("cost: $${price}").unwrap(),
            vec![TemplatePart::Literal("cost: ${price}".into())]
        );
        assert!(parse_template("").unwrap().is_empty());
    }

    #[test]
    fn test_template_errors() {
        assert_eq!(
            parse_template("a ${aws_vpc.main.id"),
            Err(ReferenceSyntaxError::Unterminated { offset: 2 })
        );
        assert_eq!(parse_template("${}"), Err(ReferenceSyntaxError::Empty));
    }
}
