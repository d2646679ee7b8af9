use crate::{
    criteria::{
        CompareOp, ComparePredicate, Criteria, Predicate, SortDirection, SortSpec, ValidateError,
        validate, validate_sort,
    },
    schema::{EntitySchema, SchemaRegistry},
    value::Value,
};
use convert_case::{Case, Casing};
use thiserror::Error as ThisError;

///
/// Descriptor parsing
///
/// Turns a declarative method-style descriptor such as
/// `findTop3ByUsernameAndAgeGreaterThanOrderByUsernameDesc` into a
/// [`Criteria`]. Parsing is schema-free and purely structural; binding
/// resolves field tokens against the entity field map, attaches
/// positional arguments, and validates the resulting criteria.
///
/// Grammar: `verb [subject] By [clause ((And|Or) clause)*] [OrderBy key+]`
/// - clause = field token + optional operator suffix (longest match)
/// - connectors split only when followed by an uppercase letter
/// - `Top<N>` / `First<N>` in the subject caps Find results
///

///
/// Verb
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verb {
    Find,
    Count,
    Exists,
    Remove,
}

///
/// Connector
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Connector {
    And,
    Or,
}

///
/// RawClause
///
/// One unresolved predicate token. `connector` joins this clause to the
/// previous one; the first clause's connector is ignored.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawClause {
    pub token: String,
    pub connector: Connector,
}

///
/// RawOrderKey
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawOrderKey {
    pub token: String,
    pub direction: SortDirection,
}

///
/// ParseError
///

#[derive(Debug, ThisError)]
pub enum ParseError {
    #[error("descriptor '{descriptor}' does not start with a known verb")]
    UnknownVerb { descriptor: String },

    #[error("descriptor '{descriptor}' is missing the 'By' keyword")]
    MissingBy { descriptor: String },

    #[error("descriptor '{descriptor}' has an empty predicate token")]
    DanglingConnector { descriptor: String },

    #[error("descriptor '{descriptor}' names an operator with no field")]
    EmptyField { descriptor: String },

    #[error("descriptor '{descriptor}' has an invalid result limit")]
    InvalidLimit { descriptor: String },

    #[error("descriptor expects {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },
}

///
/// DescriptorError
///
/// Binding failures: structural parse errors, or field/operator
/// mismatches against the entity field map.
///

#[derive(Debug, ThisError)]
pub enum DescriptorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Invalid(#[from] ValidateError),
}

// Operator suffixes, longest first so e.g. GreaterThanEqual wins over
// GreaterThan. A trailing `In` only fires when the stem still resolves,
// so fields like `login` stay intact.
const OPERATOR_SUFFIXES: &[(&str, ClauseOp)] = &[
    ("GreaterThanEqual", ClauseOp::Cmp(CompareOp::Gte)),
    ("LessThanEqual", ClauseOp::Cmp(CompareOp::Lte)),
    ("StartingWith", ClauseOp::Cmp(CompareOp::StartsWith)),
    ("GreaterThan", ClauseOp::Cmp(CompareOp::Gt)),
    ("EndingWith", ClauseOp::Cmp(CompareOp::EndsWith)),
    ("Containing", ClauseOp::Cmp(CompareOp::Contains)),
    ("IsNotNull", ClauseOp::IsNotNull),
    ("LessThan", ClauseOp::Cmp(CompareOp::Lt)),
    ("NotNull", ClauseOp::IsNotNull),
    ("IsNull", ClauseOp::IsNull),
    ("NotIn", ClauseOp::Cmp(CompareOp::NotIn)),
    ("Null", ClauseOp::IsNull),
    ("Not", ClauseOp::Cmp(CompareOp::Ne)),
    ("In", ClauseOp::Cmp(CompareOp::In)),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ClauseOp {
    Cmp(CompareOp),
    IsNull,
    IsNotNull,
}

impl ClauseOp {
    const fn takes_argument(self) -> bool {
        matches!(self, Self::Cmp(_))
    }
}

///
/// Descriptor
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Descriptor {
    verb: Verb,
    limit: Option<u64>,
    clauses: Vec<RawClause>,
    order: Vec<RawOrderKey>,
}

impl Descriptor {
    #[must_use]
    pub const fn verb(&self) -> Verb {
        self.verb
    }

    /// Result cap from a `Top<N>` / `First<N>` subject, Find verb only.
    #[must_use]
    pub const fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn clauses(&self) -> &[RawClause] {
        &self.clauses
    }

    #[must_use]
    pub fn order(&self) -> &[RawOrderKey] {
        &self.order
    }

    /// Resolve tokens against the field map, attach positional arguments,
    /// and validate the resulting criteria.
    pub fn bind(
        &self,
        registry: &SchemaRegistry,
        schema: &EntitySchema,
        args: Vec<Value>,
    ) -> Result<Criteria, DescriptorError> {
        let resolved: Vec<(String, ClauseOp, Connector)> = self
            .clauses
            .iter()
            .map(|clause| {
                let (path, op) = resolve_clause(registry, schema, &clause.token)?;
                Ok((path, op, clause.connector))
            })
            .collect::<Result<_, ValidateError>>()?;

        let expected = resolved
            .iter()
            .filter(|(_, op, _)| op.takes_argument())
            .count();
        if args.len() != expected {
            return Err(ParseError::ArityMismatch {
                expected,
                got: args.len(),
            }
            .into());
        }

        let mut args = args.into_iter();
        let mut groups: Vec<Vec<Predicate>> = Vec::new();
        for (index, (path, op, connector)) in resolved.into_iter().enumerate() {
            let predicate = match op {
                ClauseOp::Cmp(op) => {
                    let value = args.next().unwrap_or(Value::Null);
                    Predicate::Compare(ComparePredicate::new(path, op, value))
                }
                ClauseOp::IsNull => Predicate::IsNull { field: path },
                ClauseOp::IsNotNull => Predicate::IsNotNull { field: path },
            };
            // And binds tighter than Or: Or starts a new group.
            if index == 0 || connector == Connector::And {
                match groups.last_mut() {
                    Some(group) if index > 0 => group.push(predicate),
                    _ => groups.push(vec![predicate]),
                }
            } else {
                groups.push(vec![predicate]);
            }
        }

        let predicate = build_predicate(groups);

        let mut sort = SortSpec::none();
        for key in &self.order {
            let path = resolve_field_token(registry, schema, &key.token).ok_or_else(|| {
                ValidateError::UnknownField {
                    entity: schema.entity().to_string(),
                    field: key.token.to_case(Case::Snake),
                }
            })?;
            sort = sort.then(path, key.direction);
        }

        validate(registry, schema, &predicate)?;
        validate_sort(registry, schema, &sort)?;

        Ok(Criteria { predicate, sort })
    }
}

fn build_predicate(mut groups: Vec<Vec<Predicate>>) -> Predicate {
    let mut alternatives: Vec<Predicate> = groups
        .drain(..)
        .map(|mut group| {
            if group.len() == 1 {
                group.remove(0)
            } else {
                Predicate::And(group)
            }
        })
        .collect();

    match alternatives.len() {
        0 => Predicate::True,
        1 => alternatives.remove(0),
        _ => Predicate::Or(alternatives),
    }
}

/// Parse a descriptor string into its structural parts.
pub fn parse(text: &str) -> Result<Descriptor, ParseError> {
    let (verb, rest) = parse_verb(text)?;

    let Some(by_index) = find_keyword(rest, "By", 0) else {
        return Err(ParseError::MissingBy {
            descriptor: text.to_string(),
        });
    };
    let subject = &rest[..by_index];
    let tail = &rest[by_index + 2..];

    let limit = parse_limit(text, subject)?;

    let (predicate_part, order_part) = match rfind_keyword(tail, "OrderBy") {
        Some(index) => (&tail[..index], &tail[index + "OrderBy".len()..]),
        None => (tail, ""),
    };

    let clauses = parse_clauses(text, predicate_part)?;
    let order = parse_order(order_part);

    Ok(Descriptor {
        verb,
        limit,
        clauses,
        order,
    })
}

fn parse_verb(text: &str) -> Result<(Verb, &str), ParseError> {
    const VERBS: &[(&str, Verb)] = &[
        ("find", Verb::Find),
        ("get", Verb::Find),
        ("read", Verb::Find),
        ("count", Verb::Count),
        ("exists", Verb::Exists),
        ("delete", Verb::Remove),
        ("remove", Verb::Remove),
    ];

    for (prefix, verb) in VERBS {
        if let Some(rest) = text.strip_prefix(prefix) {
            return Ok((*verb, rest));
        }
    }
    Err(ParseError::UnknownVerb {
        descriptor: text.to_string(),
    })
}

// A Top/First marker at the end of the subject caps the result set;
// anything else in the subject is descriptive and ignored.
fn parse_limit(descriptor: &str, subject: &str) -> Result<Option<u64>, ParseError> {
    let digits_at = subject.len() - subject.chars().rev().take_while(char::is_ascii_digit).count();
    let (stem, digits) = subject.split_at(digits_at);

    if !(stem.ends_with("Top") || stem.ends_with("First")) {
        return Ok(None);
    }
    if digits.is_empty() {
        return Ok(Some(1));
    }
    match digits.parse::<u64>() {
        Ok(limit) if limit > 0 => Ok(Some(limit)),
        _ => Err(ParseError::InvalidLimit {
            descriptor: descriptor.to_string(),
        }),
    }
}

// Find `keyword` at a position > `from` where it starts a new PascalCase
// word (followed by an uppercase letter or the end of the string).
fn find_keyword(text: &str, keyword: &str, from: usize) -> Option<usize> {
    let mut start = from;
    while let Some(offset) = text[start..].find(keyword) {
        let index = start + offset;
        let after = index + keyword.len();
        let boundary = text[after..]
            .chars()
            .next()
            .is_none_or(|c| c.is_ascii_uppercase());
        if boundary {
            return Some(index);
        }
        start = index + 1;
    }
    None
}

fn rfind_keyword(text: &str, keyword: &str) -> Option<usize> {
    let mut best = None;
    let mut from = 0;
    while let Some(index) = find_keyword(text, keyword, from) {
        // OrderBy needs at least one key after it.
        if index + keyword.len() < text.len() {
            best = Some(index);
        }
        from = index + 1;
    }
    best
}

fn parse_clauses(descriptor: &str, part: &str) -> Result<Vec<RawClause>, ParseError> {
    let mut clauses = Vec::new();
    if part.is_empty() {
        return Ok(clauses);
    }

    let mut remaining = part;
    let mut connector = Connector::And;
    loop {
        let and_at = find_keyword(remaining, "And", 1);
        let or_at = find_keyword(remaining, "Or", 1);
        let split = match (and_at, or_at) {
            (Some(a), Some(o)) if a <= o => Some((a, Connector::And, 3)),
            (Some(a), None) => Some((a, Connector::And, 3)),
            (_, Some(o)) => Some((o, Connector::Or, 2)),
            (None, None) => None,
        };

        match split {
            Some((index, next_connector, width)) => {
                let token = &remaining[..index];
                if token.is_empty() {
                    return Err(ParseError::DanglingConnector {
                        descriptor: descriptor.to_string(),
                    });
                }
                clauses.push(RawClause {
                    token: token.to_string(),
                    connector,
                });
                connector = next_connector;
                remaining = &remaining[index + width..];
                if remaining.is_empty() {
                    return Err(ParseError::DanglingConnector {
                        descriptor: descriptor.to_string(),
                    });
                }
            }
            None => {
                clauses.push(RawClause {
                    token: remaining.to_string(),
                    connector,
                });
                break;
            }
        }
    }

    // A bare operator token has no field to apply to.
    for clause in &clauses {
        if OPERATOR_SUFFIXES
            .iter()
            .any(|(suffix, _)| *suffix == clause.token)
        {
            return Err(ParseError::EmptyField {
                descriptor: descriptor.to_string(),
            });
        }
    }

    Ok(clauses)
}

fn parse_order(part: &str) -> Vec<RawOrderKey> {
    let mut keys = Vec::new();
    let mut remaining = part;

    while !remaining.is_empty() {
        let desc_at = find_keyword(remaining, "Desc", 1);
        let asc_at = find_keyword(remaining, "Asc", 1);
        let split = match (desc_at, asc_at) {
            (Some(d), Some(a)) if d <= a => Some((d, SortDirection::Desc, 4)),
            (Some(d), None) => Some((d, SortDirection::Desc, 4)),
            (_, Some(a)) => Some((a, SortDirection::Asc, 3)),
            (None, None) => None,
        };

        match split {
            Some((index, direction, width)) => {
                keys.push(RawOrderKey {
                    token: remaining[..index].to_string(),
                    direction,
                });
                remaining = &remaining[index + width..];
            }
            None => {
                keys.push(RawOrderKey {
                    token: remaining.to_string(),
                    direction: SortDirection::Asc,
                });
                break;
            }
        }
    }

    keys
}

// Resolve one clause token: the whole token as a field wins (so `login`
// never loses its `In` tail), then operator suffixes longest-first.
fn resolve_clause(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    token: &str,
) -> Result<(String, ClauseOp), ValidateError> {
    if let Some(path) = resolve_field_token(registry, schema, token) {
        return Ok((path, ClauseOp::Cmp(CompareOp::Eq)));
    }

    for (suffix, op) in OPERATOR_SUFFIXES {
        if let Some(stem) = token.strip_suffix(suffix) {
            if stem.is_empty() {
                continue;
            }
            if let Some(path) = resolve_field_token(registry, schema, stem) {
                return Ok((path, *op));
            }
        }
    }

    Err(ValidateError::UnknownField {
        entity: schema.entity().to_string(),
        field: token.to_case(Case::Snake),
    })
}

// A PascalCase token resolves either as a root field (`Username` →
// `username`) or as a one-hop relation path (`TeamName` → `team.name`).
fn resolve_field_token(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    token: &str,
) -> Option<String> {
    let snake = token.to_case(Case::Snake);
    if registry.resolve(schema, &snake).is_ok() {
        return Some(snake);
    }

    let mut split_at = 0;
    while let Some(offset) = snake[split_at..].find('_') {
        split_at += offset;
        let (head, rest) = (&snake[..split_at], &snake[split_at + 1..]);
        if schema.relation(head).is_some() {
            let path = format!("{head}.{rest}");
            if registry.resolve(schema, &path).is_ok() {
                return Some(path);
            }
        }
        split_at += 1;
    }
    None
}

///
/// TESTS
///
