//! Turning a UML association's two ends into one directed catalogue
//! association.

use super::arena::Arena;
use crate::catalogue::{Association, AssociationKind, Multiplicity};
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Where a dialect records the aggregation marker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum AggregationMark {
    /// XMI 1.x: `aggregation` sits on the end attached to the whole.
    OnWhole,
    /// UML 2: `aggregation` sits on the property typed by the part.
    OnPart,
}

#[derive(Clone, Debug)]
pub(crate) struct AssociationEnd<'a> {
    pub type_ref: Option<&'a str>,
    pub role: Option<String>,
    pub multiplicity: Multiplicity,
    pub aggregation: Option<AssociationKind>,
    pub navigable: Option<bool>,
}

pub(crate) fn aggregation_kind(raw: Option<&str>) -> Option<AssociationKind> {
    match raw.map(str::trim) {
        Some("aggregate" | "shared") => Some(AssociationKind::Aggregation),
        Some("composite") => Some(AssociationKind::Composition),
        _ => None,
    }
}

pub(crate) fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Pick source and target: an aggregation marker fixes the whole as the
/// source; otherwise a single navigable end is the target; otherwise the
/// second end is.
fn orient(ends: [&AssociationEnd<'_>; 2], mark: AggregationMark) -> (usize, usize, AssociationKind) {
    if let Some((marked, kind)) = (0..2).find_map(|index| ends[index].aggregation.map(|kind| (index, kind))) {
        let other = 1 - marked;
        return match mark {
            AggregationMark::OnWhole => (marked, other, kind),
            AggregationMark::OnPart => (other, marked, kind),
        };
    }
    match (ends[0].navigable, ends[1].navigable) {
        (Some(true), second) if second != Some(true) => (1, 0, AssociationKind::Association),
        _ => (0, 1, AssociationKind::Association),
    }
}

/// Build the association for a binary UML association. Extra ends of an
/// n-ary association are ignored.
pub(crate) fn build_association(
    arena: &Arena<'_, '_>,
    ends: &[AssociationEnd<'_>],
    mark: AggregationMark,
    origin: &str,
    diagnostics: &mut Diagnostics,
) -> Option<Association> {
    let [first, second, ..] = ends else {
        diagnostics.warn(
            origin,
            DiagnosticKind::MalformedSource,
            format!("association with {} end(s) skipped", ends.len()),
        );
        return None;
    };
    let pair = [first, second];
    let (source, target, kind) = orient(pair, mark);

    let mut names = Vec::with_capacity(2);
    for end in [pair[source], pair[target]] {
        let Some(reference) = end.type_ref else {
            diagnostics.warn(
                origin,
                DiagnosticKind::UnresolvedReference,
                "association end without a type",
            );
            return None;
        };
        names.push(arena.resolve(reference, origin, diagnostics));
    }
    let target_name = names.pop()?;
    let source_name = names.pop()?;

    Some(
        Association::new(source_name, target_name, kind)
            .with_multiplicities(pair[source].multiplicity, pair[target].multiplicity)
            .with_role(pair[target].role.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end(aggregation: Option<AssociationKind>, navigable: Option<bool>) -> AssociationEnd<'static> {
        AssociationEnd {
            type_ref: None,
            role: None,
            multiplicity: Multiplicity::EXACTLY_ONE,
            aggregation,
            navigable,
        }
    }

    #[test]
    fn aggregation_marks_pick_the_whole() {
        let whole = end(Some(AssociationKind::Composition), None);
        let part = end(None, None);
        assert_eq!(
            orient([&whole, &part], AggregationMark::OnWhole),
            (0, 1, AssociationKind::Composition)
        );
        assert_eq!(
            orient([&whole, &part], AggregationMark::OnPart),
            (1, 0, AssociationKind::Composition)
        );
    }

    #[test]
    fn single_navigable_end_is_the_target() {
        let navigable = end(None, Some(true));
        let plain = end(None, Some(false));
        assert_eq!(
            orient([&navigable, &plain], AggregationMark::OnWhole),
            (1, 0, AssociationKind::Association)
        );
        assert_eq!(
            orient([&plain, &navigable], AggregationMark::OnWhole),
            (0, 1, AssociationKind::Association)
        );
        assert_eq!(
            orient([&navigable, &navigable], AggregationMark::OnWhole),
            (0, 1, AssociationKind::Association)
        );
    }

    #[test]
    fn flags_and_aggregation_spellings() {
        assert_eq!(parse_flag(Some("TRUE")), Some(true));
        assert_eq!(parse_flag(Some("maybe")), None);
        assert_eq!(aggregation_kind(Some("shared")), Some(AssociationKind::Aggregation));
        assert_eq!(aggregation_kind(Some("none")), None);
    }
}
