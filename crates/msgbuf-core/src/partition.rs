//! Mutual-exclusion partitioning of an element sequence.
//!
//! The partitioner walks the buffered elements strictly left to right,
//! maintaining one "current outbound message" accumulator, and yields an
//! ordered list of [`Batch`]es — each batch becomes exactly one outbound
//! call:
//!
//! 1. A `Mutex` element closes the accumulator (if non-empty) and becomes a
//!    [`Batch::Solo`] of its own.
//! 2. A `Single` element that would repeat a kind already in the
//!    accumulator, or any element whose kind clashes with an occupant per
//!    the platform's [`ConflictTable`], closes the accumulator first and
//!    starts a fresh one with itself as the first member.
//! 3. Everything else joins the accumulator.
//!
//! The same algorithm serves every platform; only the conflict table (and
//! the [`SpecFlags`] gating its rules) varies.

use tracing::debug;

use crate::element::{Element, ElementKind, Exclusivity};
use crate::specs::SpecFlags;

// =============================================================================
// Conflict table
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct ConflictRule {
    a: ElementKind,
    b: ElementKind,
    required: SpecFlags,
}

/// Pairs of element kinds that cannot share one outbound message.
///
/// Rules are symmetric: a rule `(Reply, Image)` fires whichever of the two
/// arrives second. A rule may be gated on spec flags and is ignored unless
/// all its required flags are set.
#[derive(Debug, Clone, Default)]
pub struct ConflictTable {
    rules: Vec<ConflictRule>,
}

impl ConflictTable {
    /// Creates an empty table (no extra restrictions).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unconditional rule.
    pub fn rule(self, a: ElementKind, b: ElementKind) -> Self {
        self.rule_when(a, b, SpecFlags::NONE)
    }

    /// Adds a rule that only applies when all `required` flags are set.
    pub fn rule_when(mut self, a: ElementKind, b: ElementKind, required: SpecFlags) -> Self {
        self.rules.push(ConflictRule { a, b, required });
        self
    }

    /// Returns true if an accumulator occupant of kind `occupant` excludes
    /// an incoming element of kind `incoming` under the given flags.
    pub fn conflicts(
        &self,
        occupant: ElementKind,
        incoming: ElementKind,
        specs: SpecFlags,
    ) -> bool {
        self.rules.iter().any(|rule| {
            specs.contains(rule.required)
                && ((rule.a == occupant && rule.b == incoming)
                    || (rule.a == incoming && rule.b == occupant))
        })
    }
}

// =============================================================================
// Batches
// =============================================================================

/// One outbound call's worth of elements, in send order.
#[derive(Debug, PartialEq)]
pub enum Batch<'a> {
    /// A combined message of body/single elements.
    Combined(Vec<&'a Element>),
    /// A mutex element occupying its own dedicated call.
    Solo(&'a Element),
}

// =============================================================================
// Partition algorithm
// =============================================================================

/// Partitions `elements` into ordered outbound batches.
pub fn partition<'a>(
    elements: &'a [Element],
    table: &ConflictTable,
    specs: SpecFlags,
) -> Vec<Batch<'a>> {
    let mut batches = Vec::new();
    let mut acc: Vec<&'a Element> = Vec::new();
    let mut kinds: Vec<ElementKind> = Vec::new();

    for element in elements {
        let kind = element.kind();
        match element.exclusivity() {
            Exclusivity::Mutex => {
                if !acc.is_empty() {
                    debug!(?kind, "mutex element closes the current message");
                    batches.push(Batch::Combined(std::mem::take(&mut acc)));
                    kinds.clear();
                }
                batches.push(Batch::Solo(element));
            }
            class => {
                let repeated_single =
                    class == Exclusivity::Single && kinds.contains(&kind);
                let clashes = kinds
                    .iter()
                    .any(|&occupant| table.conflicts(occupant, kind, specs));
                if (repeated_single || clashes) && !acc.is_empty() {
                    debug!(
                        ?kind,
                        repeated_single, "element conflicts with the current message"
                    );
                    batches.push(Batch::Combined(std::mem::take(&mut acc)));
                    kinds.clear();
                }
                acc.push(element);
                kinds.push(kind);
            }
        }
    }

    if !acc.is_empty() {
        batches.push(Batch::Combined(acc));
    }
    batches
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    fn kinds_of(batch: &Batch<'_>) -> Vec<ElementKind> {
        match batch {
            Batch::Combined(els) => els.iter().map(|e| e.kind()).collect(),
            Batch::Solo(el) => vec![el.kind()],
        }
    }

    #[test]
    fn test_body_elements_stay_in_one_batch() {
        let elements = vec![
            Element::text("a"),
            Element::mention("42"),
            Element::image("x.png"),
            Element::face("1"),
        ];
        let batches = partition(&elements, &ConflictTable::new(), SpecFlags::NONE);
        assert_eq!(batches.len(), 1);
        assert_eq!(kinds_of(&batches[0]).len(), 4);
    }

    #[test]
    fn test_mutex_is_isolated() {
        // [Text, Voice, Text] -> three outbound calls.
        let elements = vec![
            Element::text("a"),
            Element::voice(crate::element::FileSource::bytes(vec![0])),
            Element::text("b"),
        ];
        let batches = partition(&elements, &ConflictTable::new(), SpecFlags::NONE);
        assert_eq!(batches.len(), 3);
        assert!(matches!(batches[0], Batch::Combined(ref v) if v.len() == 1));
        assert!(matches!(batches[1], Batch::Solo(_)));
        assert!(matches!(batches[2], Batch::Combined(ref v) if v.len() == 1));
    }

    #[test]
    fn test_leading_and_trailing_mutex() {
        let elements = vec![Element::raw("n"), Element::text("a"), Element::raw("m")];
        let batches = partition(&elements, &ConflictTable::new(), SpecFlags::NONE);
        assert_eq!(batches.len(), 3);
        assert!(matches!(batches[0], Batch::Solo(_)));
        assert!(matches!(batches[2], Batch::Solo(_)));
    }

    #[test]
    fn test_second_single_splits() {
        let elements = vec![
            Element::reply("1"),
            Element::text("a"),
            Element::reply("2"),
            Element::text("b"),
        ];
        let batches = partition(&elements, &ConflictTable::new(), SpecFlags::NONE);
        assert_eq!(batches.len(), 2);
        assert_eq!(
            kinds_of(&batches[0]),
            vec![ElementKind::Reply, ElementKind::Text]
        );
        assert_eq!(
            kinds_of(&batches[1]),
            vec![ElementKind::Reply, ElementKind::Text]
        );
    }

    #[test]
    fn test_conflict_rule_is_flag_gated() {
        let table = ConflictTable::new().rule_when(
            ElementKind::Reply,
            ElementKind::Image,
            SpecFlags::PLATFORM_QQ,
        );
        let elements = vec![
            Element::text("hi"),
            Element::reply("100"),
            Element::image("p.png"),
        ];

        // Flag unset: everything fits in one message.
        let batches = partition(&elements, &table, SpecFlags::NONE);
        assert_eq!(batches.len(), 1);

        // Flag set: [Text+Reply] then [Image].
        let batches = partition(&elements, &table, SpecFlags::PLATFORM_QQ);
        assert_eq!(batches.len(), 2);
        assert_eq!(
            kinds_of(&batches[0]),
            vec![ElementKind::Text, ElementKind::Reply]
        );
        assert_eq!(kinds_of(&batches[1]), vec![ElementKind::Image]);
    }

    #[test]
    fn test_conflict_rule_is_symmetric() {
        let table = ConflictTable::new().rule(ElementKind::Reply, ElementKind::Image);
        let elements = vec![Element::image("p.png"), Element::reply("100")];
        let batches = partition(&elements, &table, SpecFlags::NONE);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn test_same_kind_rule_caps_occurrences() {
        // One image per message, as on platforms without multi-image support.
        let table = ConflictTable::new().rule(ElementKind::Image, ElementKind::Image);
        let elements = vec![
            Element::image("a.png"),
            Element::text("x"),
            Element::image("b.png"),
        ];
        let batches = partition(&elements, &table, SpecFlags::NONE);
        assert_eq!(batches.len(), 2);
        assert_eq!(
            kinds_of(&batches[0]),
            vec![ElementKind::Image, ElementKind::Text]
        );
        assert_eq!(kinds_of(&batches[1]), vec![ElementKind::Image]);
    }

    #[test]
    fn test_order_preserved_across_batches() {
        let elements = vec![
            Element::text("1"),
            Element::voice(crate::element::FileSource::bytes(vec![0])),
            Element::text("2"),
            Element::reply("a"),
            Element::reply("b"),
        ];
        let batches = partition(&elements, &ConflictTable::new(), SpecFlags::NONE);
        let flat: Vec<String> = batches
            .iter()
            .flat_map(|b| match b {
                Batch::Combined(v) => v.iter().map(|e| e.alternative()).collect::<Vec<_>>(),
                Batch::Solo(e) => vec![e.alternative()],
            })
            .collect();
        let direct: Vec<String> = elements.iter().map(Element::alternative).collect();
        assert_eq!(flat, direct);
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let batches = partition(&[], &ConflictTable::new(), SpecFlags::NONE);
        assert!(batches.is_empty());
    }
}
