//! Structured kernel templates.
//!
//! A kernel is assembled from a [`Skeleton`] (fixed text interleaved with
//! named [`Slot`]s) and one [`ItemTemplate`] per slot. Each item template is
//! tokenized once into literal pieces and two markers:
//!
//! - `{n}`: the item index
//! - `{+offset}`: ` + <offset>` for items other than 0, nothing for item 0
//!
//! Rendering concatenates substituted pieces, so inserted text is never
//! scanned again and a slot's content cannot be re-substituted.

use std::collections::BTreeMap;

use pulsar_core::{PulsarError, Result};

/// Named insertion points of a kernel skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    /// Accumulator declarations.
    Defs,
    /// Accumulation statements.
    Sum,
    /// Local-memory stores of partial sums.
    Load,
    /// Tree-reduction steps.
    Reduce,
    /// Global-memory stores of integrated values.
    Store,
}

impl Slot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Defs => "defs",
            Self::Sum => "sum",
            Self::Load => "load",
            Self::Reduce => "reduce",
            Self::Store => "store",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Slot),
}

/// Fixed kernel text with named slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skeleton {
    segments: Vec<Segment>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends literal text.
    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        match self.segments.last_mut() {
            Some(Segment::Text(last)) => last.push_str(&text),
            _ => self.segments.push(Segment::Text(text)),
        }
        self
    }

    /// Appends a slot.
    pub fn slot(&mut self, slot: Slot) -> &mut Self {
        self.segments.push(Segment::Slot(slot));
        self
    }

    /// Slots in the order they appear.
    pub fn slots(&self) -> Vec<Slot> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Slot(slot) => Some(*slot),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Fills every slot exactly once.
    ///
    /// Fails if a slot occurs twice in the skeleton, if a slot has no fill,
    /// or if a fill names a slot the skeleton does not contain.
    pub fn render(&self, fills: &SlotFills) -> Result<String> {
        let slots = self.slots();
        for (i, slot) in slots.iter().enumerate() {
            if slots[..i].contains(slot) {
                return Err(PulsarError::Template(format!(
                    "slot '{}' appears more than once in the skeleton",
                    slot.name()
                )));
            }
        }
        if let Some(unused) = fills.slots().find(|s| !slots.contains(s)) {
            return Err(PulsarError::Template(format!(
                "fill for slot '{}' has no place in the skeleton",
                unused.name()
            )));
        }

        let mut out = String::with_capacity(
            self.segments
                .iter()
                .map(|s| match s {
                    Segment::Text(t) => t.len(),
                    Segment::Slot(_) => 0,
                })
                .sum::<usize>()
                + fills.total_len(),
        );
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(slot) => {
                    let fill = fills.get(*slot).ok_or_else(|| {
                        PulsarError::Template(format!("slot '{}' has no fill", slot.name()))
                    })?;
                    out.push_str(fill);
                }
            }
        }
        Ok(out)
    }
}

/// Rendered text for each slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotFills {
    fills: BTreeMap<Slot, String>,
}

impl SlotFills {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the text of a slot, replacing any earlier fill.
    pub fn set(&mut self, slot: Slot, text: String) -> &mut Self {
        self.fills.insert(slot, text);
        self
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.fills.get(&slot).map(String::as_str)
    }

    fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.fills.keys().copied()
    }

    fn total_len(&self) -> usize {
        self.fills.values().map(String::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Num,
    Offset,
}

/// A per-item statement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTemplate {
    pieces: Vec<Piece>,
}

impl ItemTemplate {
    const NUM: &'static str = "{n}";
    const OFFSET: &'static str = "{+offset}";

    /// Tokenizes a template string containing `{n}` and `{+offset}` markers.
    pub fn parse(template: &str) -> Self {
        let mut pieces = Vec::new();
        let mut rest = template;
        loop {
            let next = [(Self::NUM, Piece::Num), (Self::OFFSET, Piece::Offset)]
                .into_iter()
                .filter_map(|(marker, piece)| rest.find(marker).map(|at| (at, marker, piece)))
                .min_by_key(|(at, _, _)| *at);
            match next {
                Some((at, marker, piece)) => {
                    if at > 0 {
                        pieces.push(Piece::Text(rest[..at].to_string()));
                    }
                    pieces.push(piece);
                    rest = &rest[at + marker.len()..];
                }
                None => {
                    if !rest.is_empty() {
                        pieces.push(Piece::Text(rest.to_string()));
                    }
                    break;
                }
            }
        }
        Self { pieces }
    }

    /// Renders one item. Item 0 drops its offset term entirely.
    pub fn render(&self, item: u32, offset: u64) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Num => out.push_str(&item.to_string()),
                Piece::Offset => {
                    if item != 0 {
                        out.push_str(" + ");
                        out.push_str(&offset.to_string());
                    }
                }
            }
        }
        out
    }

    /// Renders items `0..count` in order, computing each offset with `offset`.
    pub fn render_items(&self, count: u32, offset: impl Fn(u32) -> u64) -> String {
        (0..count).map(|item| self.render(item, offset(item))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_zero_drops_offset_term() {
        let t = ItemTemplate::parse("acc{n} += in[base{+offset}];\n");
        assert_eq!(t.render(0, 0), "acc0 += in[base];\n");
        assert_eq!(t.render(2, 64), "acc2 += in[base + 64];\n");
    }

    #[test]
    fn test_render_items_in_order() {
        let t = ItemTemplate::parse("buffer[id{+offset}] = acc{n};\n");
        let text = t.render_items(3, |item| u64::from(item) * 8);
        assert_eq!(
            text,
            "buffer[id] = acc0;\nbuffer[id + 8] = acc1;\nbuffer[id + 16] = acc2;\n"
        );
    }

    #[test]
    fn test_repeated_markers_all_substitute() {
        let t = ItemTemplate::parse("a{n} = b{n}{+offset}{+offset};");
        assert_eq!(t.render(1, 3), "a1 = b1 + 3 + 3;");
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let t = ItemTemplate::parse("{n}");
        // an item index can never reintroduce a marker, but literal text
        // resembling one passes through untouched
        let literal = ItemTemplate::parse("x = \"{m}\"; y{n};");
        assert_eq!(t.render(7, 0), "7");
        assert_eq!(literal.render(1, 0), "x = \"{m}\"; y1;");
    }

    #[test]
    fn test_skeleton_fills_each_slot_once() {
        let mut sk = Skeleton::new();
        sk.text("begin\n").slot(Slot::Defs).text("mid\n").slot(Slot::Sum).text("end\n");
        let mut fills = SlotFills::new();
        fills.set(Slot::Defs, "d\n".into()).set(Slot::Sum, "s\n".into());
        assert_eq!(sk.render(&fills).unwrap(), "begin\nd\nmid\ns\nend\n");
        assert_eq!(sk.slots(), vec![Slot::Defs, Slot::Sum]);
    }

    #[test]
    fn test_missing_fill_is_an_error() {
        let mut sk = Skeleton::new();
        sk.slot(Slot::Store);
        let err = sk.render(&SlotFills::new()).unwrap_err();
        assert!(matches!(err, PulsarError::Template(_)));
        assert!(err.to_string().contains("store"));
    }

    #[test]
    fn test_duplicate_slot_is_an_error() {
        let mut sk = Skeleton::new();
        sk.slot(Slot::Load).text("x").slot(Slot::Load);
        let mut fills = SlotFills::new();
        fills.set(Slot::Load, String::new());
        assert!(sk.render(&fills).is_err());
    }

    #[test]
    fn test_unused_fill_is_an_error() {
        let mut sk = Skeleton::new();
        sk.slot(Slot::Defs);
        let mut fills = SlotFills::new();
        fills.set(Slot::Defs, String::new()).set(Slot::Reduce, "r".into());
        assert!(sk.render(&fills).is_err());
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let mut sk = Skeleton::new();
        sk.text("a").text("b");
        assert_eq!(sk.segments.len(), 1);
    }
}
