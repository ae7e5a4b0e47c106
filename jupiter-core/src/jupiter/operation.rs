/*
    operation.rs - Transformable text operations

    Closed set of edits:
    - NoOperation
    - Insert(position, text)
    - Delete(position, text)
    - Split(left, right): left applied first, right against the result

    Positions and lengths count chars, not bytes. Operations are immutable;
    transformation always builds a new value.
*/

use super::errors::ApplyError;
use serde::de::{
    self, DeserializeSeed, EnumAccess, IgnoredAny, MapAccess, SeqAccess, VariantAccess, Visitor,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Deepest chain of nested `Split`s accepted from the wire
pub const MAX_SPLIT_DEPTH: usize = 128;

/// Which operation wins a tie between two inserts at the same position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// The transformed operation stays in front
    First,
    /// The transformed operation is shifted behind the applied one
    Second,
}

impl Priority {
    /// Lower site id goes first
    pub fn from_sites<T: Ord>(own: T, other: T) -> Self {
        if own < other {
            Priority::First
        } else {
            Priority::Second
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Priority::First => Priority::Second,
            Priority::Second => Priority::First,
        }
    }
}

/// An edit on a text document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    #[serde(rename = "NoOp")]
    NoOperation,
    Insert { pos: usize, text: String },
    Delete { pos: usize, text: String },
    Split { left: Box<Operation>, right: Box<Operation> },
}

impl Operation {
    pub fn insert(pos: usize, text: impl Into<String>) -> Self {
        Operation::Insert { pos, text: text.into() }
    }

    pub fn delete(pos: usize, text: impl Into<String>) -> Self {
        Operation::Delete { pos, text: text.into() }
    }

    /// Compose two operations applied in sequence.
    ///
    /// NoOperation is absorbed, so the result is only a `Split` when both
    /// sides do something.
    pub fn split(left: Operation, right: Operation) -> Self {
        match (left, right) {
            (Operation::NoOperation, other) | (other, Operation::NoOperation) => other,
            (left, right) => Operation::Split { left: Box::new(left), right: Box::new(right) },
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Operation::NoOperation)
    }

    /// Number of chars the operation inserts or removes
    pub fn text_len(&self) -> usize {
        match self {
            Operation::NoOperation => 0,
            Operation::Insert { text, .. } | Operation::Delete { text, .. } => {
                text.chars().count()
            }
            Operation::Split { left, right } => left.text_len() + right.text_len(),
        }
    }

    /// Net change in document length after applying the operation
    pub fn length_delta(&self) -> isize {
        match self {
            Operation::NoOperation => 0,
            Operation::Insert { text, .. } => text.chars().count() as isize,
            Operation::Delete { text, .. } => -(text.chars().count() as isize),
            Operation::Split { left, right } => left.length_delta() + right.length_delta(),
        }
    }

    /// The operation that undoes this one
    pub fn invert(&self) -> Operation {
        match self {
            Operation::NoOperation => Operation::NoOperation,
            Operation::Insert { pos, text } => Operation::delete(*pos, text.clone()),
            Operation::Delete { pos, text } => Operation::insert(*pos, text.clone()),
            Operation::Split { left, right } => Operation::Split {
                left: Box::new(right.invert()),
                right: Box::new(left.invert()),
            },
        }
    }

    /// Check that every position fits a document of `len` chars.
    ///
    /// Split sides are checked against the length left by the side before.
    pub fn check_bounds(&self, len: usize) -> Result<usize, ApplyError> {
        match self {
            Operation::NoOperation => Ok(len),
            Operation::Insert { pos, text } => {
                if *pos > len {
                    return Err(ApplyError::OutOfRange { position: *pos, length: len });
                }
                len.checked_add(text.chars().count())
                    .ok_or(ApplyError::OutOfRange { position: *pos, length: len })
            }
            Operation::Delete { pos, text } => {
                let end = pos
                    .checked_add(text.chars().count())
                    .ok_or(ApplyError::OutOfRange { position: *pos, length: len })?;
                if end > len {
                    return Err(ApplyError::OutOfRange { position: end, length: len });
                }
                Ok(len - text.chars().count())
            }
            Operation::Split { left, right } => {
                let after_left = left.check_bounds(len)?;
                right.check_bounds(after_left)
            }
        }
    }

    /// Apply the operation to `doc`.
    ///
    /// With `validate_deletes` the removed range must equal the recorded
    /// delete text. On error `doc` is left untouched.
    pub fn apply_to(&self, doc: &mut String, validate_deletes: bool) -> Result<(), ApplyError> {
        self.check_bounds(doc.chars().count())?;

        let mut scratch = doc.clone();
        self.apply_unchecked(&mut scratch, validate_deletes)?;
        *doc = scratch;
        Ok(())
    }

    /// Apply with delete validation enabled
    pub fn apply(&self, doc: &mut String) -> Result<(), ApplyError> {
        self.apply_to(doc, true)
    }

    fn apply_unchecked(&self, doc: &mut String, validate_deletes: bool) -> Result<(), ApplyError> {
        match self {
            Operation::NoOperation => {}
            Operation::Insert { pos, text } => {
                let at = byte_offset(doc, *pos);
                doc.insert_str(at, text);
            }
            Operation::Delete { pos, text } => {
                let start = byte_offset(doc, *pos);
                let end = byte_offset(doc, pos + text.chars().count());
                if validate_deletes && &doc[start..end] != text.as_str() {
                    return Err(ApplyError::TextMismatch {
                        position: *pos,
                        expected: text.clone(),
                        found: doc[start..end].to_string(),
                    });
                }
                doc.replace_range(start..end, "");
            }
            Operation::Split { left, right } => {
                left.apply_unchecked(doc, validate_deletes)?;
                right.apply_unchecked(doc, validate_deletes)?;
            }
        }
        Ok(())
    }

    /// Rewrite `self` so it applies after `applied`.
    ///
    /// Both operations must have been generated against the same document
    /// state. `priority` settles inserts at the same position and must be
    /// the opposite value when transforming `applied` against `self`.
    pub fn transform(&self, applied: &Operation, priority: Priority) -> Operation {
        match (self, applied) {
            (_, Operation::NoOperation) => self.clone(),
            (Operation::NoOperation, _) => Operation::NoOperation,

            (Operation::Split { left, right }, _) => {
                let new_left = left.transform(applied, priority);
                let applied_after_left = applied.transform(left, priority.flip());
                let new_right = right.transform(&applied_after_left, priority);
                Operation::split(new_left, new_right)
            }
            (_, Operation::Split { left, right }) => {
                self.transform(left, priority).transform(right, priority)
            }

            (Operation::Insert { pos, text }, Operation::Insert { pos: other, text: other_text }) => {
                transform_insert_insert(*pos, text, *other, other_text, priority)
            }
            (Operation::Insert { pos, text }, Operation::Delete { pos: other, text: other_text }) => {
                transform_insert_delete(*pos, text, *other, other_text)
            }
            (Operation::Delete { pos, text }, Operation::Insert { pos: other, text: other_text }) => {
                transform_delete_insert(*pos, text, *other, other_text)
            }
            (Operation::Delete { pos, text }, Operation::Delete { pos: other, text: other_text }) => {
                transform_delete_delete(*pos, text, *other, other_text)
            }
        }
    }
}

fn transform_insert_insert(
    pos: usize,
    text: &str,
    other: usize,
    other_text: &str,
    priority: Priority,
) -> Operation {
    if pos < other || (pos == other && priority == Priority::First) {
        Operation::insert(pos, text)
    } else {
        Operation::insert(pos.saturating_add(other_text.chars().count()), text)
    }
}

fn transform_insert_delete(pos: usize, text: &str, other: usize, other_text: &str) -> Operation {
    let deleted = other_text.chars().count();
    if pos <= other {
        Operation::insert(pos, text)
    } else if pos >= other.saturating_add(deleted) {
        Operation::insert(pos.saturating_sub(deleted), text)
    } else {
        // inside the removed range: pinned to the deletion point
        Operation::insert(other, text)
    }
}

fn transform_delete_insert(pos: usize, text: &str, other: usize, other_text: &str) -> Operation {
    let len = text.chars().count();
    let inserted = other_text.chars().count();
    if other >= pos.saturating_add(len) {
        Operation::delete(pos, text)
    } else if other <= pos {
        Operation::delete(pos.saturating_add(inserted), text)
    } else {
        // the insert lands inside: delete around it
        let cut = other - pos;
        Operation::Split {
            left: Box::new(Operation::delete(pos, char_slice(text, 0, cut))),
            right: Box::new(Operation::delete(pos.saturating_add(inserted), char_slice(text, cut, len))),
        }
    }
}

fn transform_delete_delete(pos: usize, text: &str, other: usize, other_text: &str) -> Operation {
    let len = text.chars().count();
    let other_len = other_text.chars().count();
    let end = pos.saturating_add(len);
    let other_end = other.saturating_add(other_len);

    if end <= other {
        return Operation::delete(pos, text);
    }
    if pos >= other_end {
        return Operation::delete(pos.saturating_sub(other_len), text);
    }

    // overlap: keep whatever the other delete did not remove
    let head = if pos < other { char_slice(text, 0, other - pos) } else { String::new() };
    let tail = if end > other_end { char_slice(text, other_end - pos, len) } else { String::new() };
    let remaining = head + &tail;

    if remaining.is_empty() {
        Operation::NoOperation
    } else {
        Operation::delete(pos.min(other), remaining)
    }
}

/// Byte offset of the char at `index` (or the end of the string)
fn byte_offset(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map(|(i, _)| i).unwrap_or(s.len())
}

fn char_slice(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

// Deserialization is written out by hand so untrusted input cannot nest
// Split deep enough to exhaust the stack. The accepted layout is the one
// the derived Serialize produces.

const VARIANTS: &[&str] = &["NoOp", "Insert", "Delete", "Split"];
const EDIT_FIELDS: &[&str] = &["pos", "text"];
const SPLIT_FIELDS: &[&str] = &["left", "right"];

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        OperationSeed { splits: 0 }.deserialize(deserializer)
    }
}

/// Deserializes one operation that sits under `splits` enclosing splits
struct OperationSeed {
    splits: usize,
}

impl<'de> DeserializeSeed<'de> for OperationSeed {
    type Value = Operation;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Operation, D::Error> {
        deserializer.deserialize_enum("Operation", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for OperationSeed {
    type Value = Operation;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an operation")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Operation, A::Error> {
        let (tag, variant) = data.variant::<Tag>()?;
        match tag {
            Tag::NoOp => {
                variant.unit_variant()?;
                Ok(Operation::NoOperation)
            }
            Tag::Insert => variant.struct_variant(EDIT_FIELDS, EditVisitor { delete: false }),
            Tag::Delete => variant.struct_variant(EDIT_FIELDS, EditVisitor { delete: true }),
            Tag::Split => {
                if self.splits >= MAX_SPLIT_DEPTH {
                    return Err(de::Error::custom(format!(
                        "split nesting exceeds {} levels",
                        MAX_SPLIT_DEPTH
                    )));
                }
                variant.struct_variant(SPLIT_FIELDS, SplitVisitor { splits: self.splits + 1 })
            }
        }
    }
}

enum Tag {
    NoOp,
    Insert,
    Delete,
    Split,
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagVisitor;

        impl<'de> Visitor<'de> for TagVisitor {
            type Value = Tag;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an operation variant")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Tag, E> {
                match value {
                    0 => Ok(Tag::NoOp),
                    1 => Ok(Tag::Insert),
                    2 => Ok(Tag::Delete),
                    3 => Ok(Tag::Split),
                    _ => Err(E::invalid_value(
                        de::Unexpected::Unsigned(value),
                        &"variant index 0 <= i < 4",
                    )),
                }
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Tag, E> {
                match value {
                    "NoOp" => Ok(Tag::NoOp),
                    "Insert" => Ok(Tag::Insert),
                    "Delete" => Ok(Tag::Delete),
                    "Split" => Ok(Tag::Split),
                    _ => Err(E::unknown_variant(value, VARIANTS)),
                }
            }
        }

        deserializer.deserialize_identifier(TagVisitor)
    }
}

/// Field names of a struct variant; anything else is skipped
enum Field {
    First,
    Second,
    Ignored,
}

struct FieldSeed(&'static [&'static str]);

impl<'de> DeserializeSeed<'de> for FieldSeed {
    type Value = Field;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Field, D::Error> {
        deserializer.deserialize_identifier(self)
    }
}

impl<'de> Visitor<'de> for FieldSeed {
    type Value = Field;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "one of {:?}", self.0)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Field, E> {
        Ok(match value {
            0 => Field::First,
            1 => Field::Second,
            _ => Field::Ignored,
        })
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Field, E> {
        Ok(if value == self.0[0] {
            Field::First
        } else if value == self.0[1] {
            Field::Second
        } else {
            Field::Ignored
        })
    }
}

struct EditVisitor {
    delete: bool,
}

impl EditVisitor {
    fn build(&self, pos: usize, text: String) -> Operation {
        if self.delete {
            Operation::Delete { pos, text }
        } else {
            Operation::Insert { pos, text }
        }
    }
}

impl<'de> Visitor<'de> for EditVisitor {
    type Value = Operation;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an edit with pos and text")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Operation, A::Error> {
        let pos = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let text = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(1, &self))?;
        Ok(self.build(pos, text))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Operation, A::Error> {
        let mut pos = None;
        let mut text = None;
        while let Some(field) = map.next_key_seed(FieldSeed(EDIT_FIELDS))? {
            match field {
                Field::First => {
                    if pos.is_some() {
                        return Err(de::Error::duplicate_field("pos"));
                    }
                    pos = Some(map.next_value()?);
                }
                Field::Second => {
                    if text.is_some() {
                        return Err(de::Error::duplicate_field("text"));
                    }
                    text = Some(map.next_value()?);
                }
                Field::Ignored => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        let pos = pos.ok_or_else(|| de::Error::missing_field("pos"))?;
        let text = text.ok_or_else(|| de::Error::missing_field("text"))?;
        Ok(self.build(pos, text))
    }
}

struct SplitVisitor {
    splits: usize,
}

impl<'de> Visitor<'de> for SplitVisitor {
    type Value = Operation;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a split with left and right")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Operation, A::Error> {
        let left = seq
            .next_element_seed(OperationSeed { splits: self.splits })?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let right = seq
            .next_element_seed(OperationSeed { splits: self.splits })?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        Ok(Operation::Split { left: Box::new(left), right: Box::new(right) })
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Operation, A::Error> {
        let mut left = None;
        let mut right = None;
        while let Some(field) = map.next_key_seed(FieldSeed(SPLIT_FIELDS))? {
            match field {
                Field::First => {
                    if left.is_some() {
                        return Err(de::Error::duplicate_field("left"));
                    }
                    left = Some(map.next_value_seed(OperationSeed { splits: self.splits })?);
                }
                Field::Second => {
                    if right.is_some() {
                        return Err(de::Error::duplicate_field("right"));
                    }
                    right = Some(map.next_value_seed(OperationSeed { splits: self.splits })?);
                }
                Field::Ignored => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        let left = left.ok_or_else(|| de::Error::missing_field("left"))?;
        let right = right.ok_or_else(|| de::Error::missing_field("right"))?;
        Ok(Operation::Split { left: Box::new(left), right: Box::new(right) })
    }
}
