//! Polish-notation search domain encoding: the `|` (OR) / `!` (NOT)
//! operators are written before their operands, AND is implicit between
//! consecutive top-level terms — the convention Odoo-style JSON-RPC/XML-RPC
//! gateways expect wherever a domain argument is accepted
//! (`search`/`search_read`/`search_count`).

use serde_json::{json, Value};

/// A search domain, built as a tree and flattened to Polish notation by
/// `encode_domain`.
#[derive(Clone, Debug)]
pub enum Domain {
    Condition {
        field: String,
        operator: String,
        value: Value,
    },
    And(Vec<Domain>),
    Or(Box<Domain>, Box<Domain>),
    Not(Box<Domain>),
}

impl Domain {
    pub fn condition(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Domain::Condition {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn and(terms: Vec<Domain>) -> Self {
        Domain::And(terms)
    }

    pub fn or(left: Domain, right: Domain) -> Self {
        Domain::Or(Box::new(left), Box::new(right))
    }

    pub fn not(inner: Domain) -> Self {
        Domain::Not(Box::new(inner))
    }

    pub fn empty() -> Self {
        Domain::And(Vec::new())
    }
}

/// Flattens `domain` into the Polish-notation array the wire protocol
/// expects: `[('|', t1, t2), t3]` style trees become
/// `["|", t1, t2, t3]`.
pub fn encode_domain(domain: &Domain) -> Value {
    let mut terms = Vec::new();
    flatten(domain, &mut terms);
    Value::Array(terms)
}

fn flatten(domain: &Domain, out: &mut Vec<Value>) {
    match domain {
        Domain::Condition { field, operator, value } => {
            out.push(json!([field, operator, value]));
        }
        Domain::And(children) => {
            for child in children {
                flatten(child, out);
            }
        }
        Domain::Or(left, right) => {
            out.push(json!("|"));
            flatten(left, out);
            flatten(right, out);
        }
        Domain::Not(inner) => {
            out.push(json!("!"));
            flatten(inner, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_domain_encodes_to_empty_array() {
        assert_eq!(encode_domain(&Domain::empty()), json!([]));
    }

    #[test]
    fn implicit_and_just_concatenates_conditions() {
        let domain = Domain::and(vec![
            Domain::condition("active", "=", true),
            Domain::condition("company_id", "=", 1),
        ]);

        assert_eq!(
            encode_domain(&domain),
            json!([["active", "=", true], ["company_id", "=", 1]])
        );
    }

    #[test]
    fn or_prefixes_the_operator_before_its_operands() {
        let domain = Domain::or(
            Domain::condition("email", "=", "a@example.com"),
            Domain::condition("email", "=", "b@example.com"),
        );

        assert_eq!(
            encode_domain(&domain),
            json!(["|", ["email", "=", "a@example.com"], ["email", "=", "b@example.com"]])
        );
    }

    #[test]
    fn not_prefixes_a_single_operand() {
        let domain = Domain::not(Domain::condition("active", "=", false));

        assert_eq!(encode_domain(&domain), json!(["!", ["active", "=", false]]));
    }

    #[test]
    fn or_nests_inside_an_implicit_and() {
        let domain = Domain::and(vec![
            Domain::condition("company_id", "=", 1),
            Domain::or(
                Domain::condition("state", "=", "draft"),
                Domain::condition("state", "=", "sent"),
            ),
        ]);

        assert_eq!(
            encode_domain(&domain),
            json!([
                ["company_id", "=", 1],
                "|",
                ["state", "=", "draft"],
                ["state", "=", "sent"]
            ])
        );
    }
}
