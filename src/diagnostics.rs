//! Schema error diagnostics
//!
//! A single defect in a GeoJSON file usually makes the schema engine emit a burst of
//! related errors (every failed `anyOf` branch, every nested `required`). This module
//! turns that burst into one readable message per defect:
//!
//! 1. each engine error becomes a [`SchemaErrorCandidate`],
//! 2. candidates are classified into an [`ErrorKind`] and ranked,
//! 3. the [`DefectSelector`] keeps the best candidate per feature (or per location
//!    for errors outside any feature),
//! 4. [`synthesize_message`] renders the winner.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::accumulator::BoundedAccumulator;

/// Draft 7 keywords recognised when classifying by schema location
const SCHEMA_KEYWORDS: &[&str] = &[
    "additionalItems",
    "additionalProperties",
    "allOf",
    "anyOf",
    "const",
    "contains",
    "dependencies",
    "enum",
    "exclusiveMaximum",
    "exclusiveMinimum",
    "format",
    "if",
    "items",
    "maxItems",
    "maxLength",
    "maxProperties",
    "maximum",
    "minItems",
    "minLength",
    "minProperties",
    "minimum",
    "multipleOf",
    "not",
    "oneOf",
    "pattern",
    "propertyNames",
    "required",
    "type",
    "uniqueItems",
];

/// Keywords that are looked for inside free-form messages
static MESSAGE_KEYWORD_REGEX: OnceLock<Regex> = OnceLock::new();

/// `... or 3 other candidates` suffixes produced for enum failures
static OTHER_CANDIDATES_REGEX: OnceLock<Regex> = OnceLock::new();

fn message_keyword_regex() -> &'static Regex {
    MESSAGE_KEYWORD_REGEX.get_or_init(|| {
        Regex::new(r"\b(anyOf|oneOf|allOf|enum|required|pattern|const)\b")
            .expect("Failed to compile keyword regex")
    })
}

fn other_candidates_regex() -> &'static Regex {
    OTHER_CANDIDATES_REGEX.get_or_init(|| {
        Regex::new(r"\s*or \d+ other candidates?")
            .expect("Failed to compile candidates regex")
    })
}

/// One segment of a JSON instance location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Split a JSON pointer (`/features/0/properties`) into unescaped segments
pub fn parse_pointer(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn instance_segments(pointer: &str) -> Vec<PathSegment> {
    parse_pointer(pointer)
        .into_iter()
        .map(|segment| match segment.parse::<usize>() {
            Ok(index) => PathSegment::Index(index),
            Err(_) => PathSegment::Key(segment),
        })
        .collect()
}

/// Engine-independent view of one schema violation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaErrorCandidate {
    /// Location of the offending value in the instance
    pub instance_path: Vec<PathSegment>,
    /// Location of the violated keyword in the schema
    pub schema_path: Vec<String>,
    /// Classification name reported by the engine (`Required`, `AnyOf`, ...)
    pub kind: Option<String>,
    /// The violated keyword (`required`, `anyOf`, ...)
    pub keyword: Option<String>,
    pub message: String,
}

impl SchemaErrorCandidate {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_instance_path(mut self, path: Vec<PathSegment>) -> Self {
        self.instance_path = path;
        self
    }

    pub fn with_schema_path<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.schema_path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Instance location rendered as a JSON pointer
    pub fn instance_pointer(&self) -> String {
        self.instance_path
            .iter()
            .map(|segment| format!("/{segment}"))
            .collect()
    }
}

impl From<&jsonschema::ValidationError<'_>> for SchemaErrorCandidate {
    fn from(err: &jsonschema::ValidationError<'_>) -> Self {
        let schema_path = parse_pointer(&err.schema_path.to_string());
        let keyword = schema_path
            .last()
            .filter(|segment| SCHEMA_KEYWORDS.contains(&segment.as_str()))
            .cloned();

        // `Required { property: .. }` -> `Required`
        let debug = format!("{:?}", err.kind);
        let kind = debug
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_owned);

        Self {
            instance_path: instance_segments(&err.instance_path.to_string()),
            schema_path,
            kind,
            keyword,
            message: err.to_string(),
        }
    }
}

/// Classification of a candidate, used for ranking and message synthesis
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Enum,
    Required,
    Pattern,
    AnyOf,
    Other(String),
    Unknown,
}

impl ErrorKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Enum" => ErrorKind::Enum,
            "Required" => ErrorKind::Required,
            "Pattern" => ErrorKind::Pattern,
            "AnyOf" => ErrorKind::AnyOf,
            "" => ErrorKind::Unknown,
            other => ErrorKind::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ErrorKind::Enum => "Enum",
            ErrorKind::Required => "Required",
            ErrorKind::Pattern => "Pattern",
            ErrorKind::AnyOf => "AnyOf",
            ErrorKind::Other(name) => name,
            ErrorKind::Unknown => "",
        }
    }

    fn priority(&self) -> u8 {
        match self {
            ErrorKind::Enum => 0,
            ErrorKind::Required => 1,
            ErrorKind::Pattern => 2,
            _ => 3,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `anyOf` -> `AnyOf`
fn pascal_case(keyword: &str) -> String {
    let mut chars = keyword.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

type KindExtractor = fn(&SchemaErrorCandidate) -> Option<ErrorKind>;

fn kind_from_classification(candidate: &SchemaErrorCandidate) -> Option<ErrorKind> {
    candidate
        .kind
        .as_deref()
        .map(|name| name.rsplit('_').next().unwrap_or(name))
        .filter(|name| !name.is_empty())
        .map(ErrorKind::from_name)
}

fn kind_from_keyword(candidate: &SchemaErrorCandidate) -> Option<ErrorKind> {
    candidate
        .keyword
        .as_deref()
        .filter(|keyword| !keyword.is_empty())
        .map(|keyword| ErrorKind::from_name(&pascal_case(keyword)))
}

fn kind_from_message(candidate: &SchemaErrorCandidate) -> Option<ErrorKind> {
    message_keyword_regex()
        .captures(&candidate.message)
        .map(|caps| ErrorKind::from_name(&pascal_case(&caps[1])))
}

/// Tried in order; the first extractor with an answer decides the kind
const KIND_EXTRACTORS: [KindExtractor; 3] =
    [kind_from_classification, kind_from_keyword, kind_from_message];

pub fn classify(candidate: &SchemaErrorCandidate) -> ErrorKind {
    KIND_EXTRACTORS
        .iter()
        .find_map(|extract| extract(candidate))
        .unwrap_or(ErrorKind::Unknown)
}

/// Ordering key for candidates of the same defect; smaller is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rank {
    priority: u8,
    message_len: usize,
}

pub fn rank_for(candidate: &SchemaErrorCandidate) -> Rank {
    Rank {
        priority: classify(candidate).priority(),
        message_len: candidate.message.chars().count(),
    }
}

/// Index of the feature an error points into (`/features/<n>/...`)
pub fn feature_index(candidate: &SchemaErrorCandidate) -> Option<usize> {
    match candidate.instance_path.as_slice() {
        [PathSegment::Key(key), PathSegment::Index(index), ..] if key == "features" => {
            Some(*index)
        }
        _ => None,
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or("").trim().to_string()
}

/// Drop the `or N other candidates` noise and keep the first line
pub fn clean_enum_message(message: &str) -> String {
    first_line(&other_candidates_regex().replace_all(message, ""))
}

/// Human-readable message for the winning candidate of a defect
pub fn synthesize_message(candidate: &SchemaErrorCandidate, schema: &Value) -> String {
    match classify(candidate) {
        ErrorKind::Enum => clean_enum_message(&candidate.message),
        ErrorKind::AnyOf => {
            let fields = required_alternatives(schema, &candidate.schema_path);
            if fields.is_empty() {
                first_line(&candidate.message)
            } else {
                let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
                format!("must include one of: {}", fields.join(", "))
            }
        }
        _ => first_line(&candidate.message),
    }
}

/// Maximum `$ref` hops followed while walking a schema
const MAX_REF_DEPTH: usize = 32;

fn resolve_ref<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        Some(root)
    } else {
        root.pointer(pointer)
    }
}

/// Follow `path` from the schema root. Schema locations reported by the engine
/// may or may not spell out the `$ref` hops, so both forms are resolved.
fn subschema_at<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for segment in path {
        node = step(root, node, segment, 0)?;
    }
    Some(node)
}

fn step<'a>(root: &'a Value, node: &'a Value, segment: &str, depth: usize) -> Option<&'a Value> {
    if depth > MAX_REF_DEPTH {
        return None;
    }
    match node {
        Value::Object(map) => {
            let reference = map.get("$ref").and_then(Value::as_str);
            if segment == "$ref" {
                return resolve_ref(root, reference?);
            }
            match map.get(segment) {
                Some(child) => Some(child),
                None => step(root, resolve_ref(root, reference?)?, segment, depth + 1),
            }
        }
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn collect_required(root: &Value, node: &Value, depth: usize, out: &mut BTreeSet<String>) {
    if depth > MAX_REF_DEPTH {
        return;
    }
    match node {
        Value::Array(items) => {
            for item in items {
                collect_required(root, item, depth, out);
            }
        }
        Value::Object(map) => {
            if let Some(Value::Array(required)) = map.get("required") {
                out.extend(required.iter().filter_map(Value::as_str).map(str::to_owned));
            }
            for combinator in ["allOf", "anyOf", "oneOf"] {
                if let Some(branches) = map.get(combinator) {
                    collect_required(root, branches, depth, out);
                }
            }
            if let Some(target) = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|reference| resolve_ref(root, reference))
            {
                collect_required(root, target, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Sorted union of the fields required by any alternative of the `anyOf` at `schema_path`
pub fn required_alternatives(schema: &Value, schema_path: &[String]) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();
    if let Some(node) = subschema_at(schema, schema_path) {
        collect_required(schema, node, 0, &mut fields);
    }
    fields
}

/// Grouping key for candidates describing the same defect
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefectKey {
    Feature(usize),
    Location(String),
}

impl DefectKey {
    pub fn for_candidate(candidate: &SchemaErrorCandidate) -> Self {
        match feature_index(candidate) {
            Some(index) => DefectKey::Feature(index),
            None => DefectKey::Location(candidate.instance_pointer()),
        }
    }
}

/// Best candidate found so far for one defect
#[derive(Debug, Clone)]
pub struct SelectedDefect {
    pub key: DefectKey,
    pub candidate: SchemaErrorCandidate,
    pub rank: Rank,
}

impl SelectedDefect {
    pub fn feature_index(&self) -> Option<usize> {
        match self.key {
            DefectKey::Feature(index) => Some(index),
            DefectKey::Location(_) => None,
        }
    }
}

/// Keeps the best-ranked candidate per defect, for at most `max_defects` defects,
/// in order of first appearance.
#[derive(Debug)]
pub struct DefectSelector {
    defects: BoundedAccumulator<SelectedDefect>,
    positions: HashMap<DefectKey, usize>,
}

impl DefectSelector {
    pub fn new(max_defects: usize) -> Self {
        Self {
            defects: BoundedAccumulator::new(max_defects),
            positions: HashMap::new(),
        }
    }

    /// Offer a candidate. Returns `false` once a new defect shows up after the
    /// budget is spent, at which point the caller should stop producing candidates.
    pub fn offer(&mut self, candidate: SchemaErrorCandidate) -> bool {
        let key = DefectKey::for_candidate(&candidate);
        let rank = rank_for(&candidate);

        if let Some(&position) = self.positions.get(&key) {
            if let Some(current) = self.defects.get_mut(position)
                && rank < current.rank
            {
                current.candidate = candidate;
                current.rank = rank;
            }
            return true;
        }

        if self.defects.is_full() {
            return false;
        }

        self.positions.insert(key.clone(), self.defects.len());
        self.defects.add(SelectedDefect {
            key,
            candidate,
            rank,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.defects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defects.is_empty()
    }

    pub fn into_defects(self) -> Vec<SelectedDefect> {
        self.defects.into_vec()
    }
}
