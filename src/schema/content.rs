//! Matching child elements against a content model.
//!
//! A particle is applied to a *frontier*: the set of child positions
//! reachable so far, each with the declarations its consumed children were
//! attributed to. Frontiers are deduplicated by position, so repetition and
//! choice stay polynomial without backtracking.

use super::model::{Particle, ProcessContents, Schema, Term};
use crate::xml::XmlElement;
use itertools::Itertools;
use std::collections::{BTreeSet, HashSet};

/// What a matched child element was attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attribution {
    Element(usize),
    Wildcard(ProcessContents),
}

type State = (usize, Vec<Attribution>);

impl Schema {
    /// Match `children` in full against `particle`.
    ///
    /// Returns one attribution per child on success.
    pub(crate) fn match_content(
        &self,
        particle: &Particle,
        children: &[&XmlElement],
    ) -> Option<Vec<Attribution>> {
        self.apply_particle(particle, children, vec![(0, Vec::new())])
            .into_iter()
            .find(|(pos, _)| *pos == children.len())
            .map(|(_, attributions)| attributions)
    }

    fn apply_particle(
        &self,
        particle: &Particle,
        children: &[&XmlElement],
        frontier: Vec<State>,
    ) -> Vec<State> {
        let mut current = frontier;
        let mut repeats = 0;
        while repeats < particle.min {
            let next = dedup(self.apply_term(&particle.term, children, current.clone()));
            repeats += 1;
            if next.is_empty() {
                return next;
            }
            // A term that can match nothing maps this frontier onto itself,
            // and so does every remaining required repetition.
            if positions(&next) == positions(&current) {
                current = next;
                repeats = particle.min;
                break;
            }
            current = next;
        }

        let mut reached = current.clone();
        let mut seen: HashSet<usize> = reached.iter().map(|(pos, _)| *pos).collect();
        while particle.max.is_none_or(|max| repeats < max) {
            // Only repetitions that consume something can lead anywhere new.
            let fresh: Vec<State> = self
                .apply_term(&particle.term, children, current)
                .into_iter()
                .filter(|(pos, _)| seen.insert(*pos))
                .collect();
            if fresh.is_empty() {
                break;
            }
            reached.extend(fresh.iter().cloned());
            current = fresh;
            repeats += 1;
        }
        reached
    }

    fn apply_term(&self, term: &Term, children: &[&XmlElement], frontier: Vec<State>) -> Vec<State> {
        match term {
            Term::Element(id) => frontier
                .into_iter()
                .filter_map(|(pos, mut path)| {
                    let child = children.get(pos)?;
                    self.declares(*id, child).then(|| {
                        path.push(Attribution::Element(*id));
                        (pos + 1, path)
                    })
                })
                .collect(),
            Term::Any(wildcard) => frontier
                .into_iter()
                .filter_map(|(pos, mut path)| {
                    let child = children.get(pos)?;
                    wildcard.allows(child.namespace()).then(|| {
                        path.push(Attribution::Wildcard(wildcard.process));
                        (pos + 1, path)
                    })
                })
                .collect(),
            Term::Sequence(items) => items.iter().fold(frontier, |states, item| {
                if states.is_empty() {
                    states
                } else {
                    self.apply_particle(item, children, states)
                }
            }),
            Term::Choice(items) => dedup(
                items
                    .iter()
                    .flat_map(|item| self.apply_particle(item, children, frontier.clone()))
                    .collect(),
            ),
            Term::All(items) => dedup(
                frontier
                    .into_iter()
                    .filter_map(|state| self.apply_all(items, children, state))
                    .collect(),
            ),
        }
    }

    /// `xs:all`: each member at most once, in any order.
    fn apply_all(&self, items: &[Particle], children: &[&XmlElement], state: State) -> Option<State> {
        let (mut pos, mut path) = state;
        let mut used = vec![false; items.len()];
        while let Some(child) = children.get(pos) {
            let next = items.iter().enumerate().find_map(|(i, item)| match &item.term {
                Term::Element(id) if !used[i] && self.declares(*id, child) => Some((i, *id)),
                _ => None,
            });
            let Some((i, id)) = next else { break };
            used[i] = true;
            path.push(Attribution::Element(id));
            pos += 1;
        }
        let complete = items
            .iter()
            .zip(&used)
            .all(|(item, used)| *used || item.min == 0);
        complete.then_some((pos, path))
    }

    /// True if element declaration `id` matches `child` by expanded name.
    fn declares(&self, id: usize, child: &XmlElement) -> bool {
        let decl = &self.elements[id];
        decl.name == child.local_name() && decl.namespace.as_deref() == child.namespace()
    }
}

fn dedup(states: Vec<State>) -> Vec<State> {
    states.into_iter().unique_by(|(pos, _)| *pos).collect()
}

fn positions(states: &[State]) -> BTreeSet<usize> {
    states.iter().map(|(pos, _)| *pos).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{ElementDecl, TypeRef};
    use crate::xml::XmlDocument;

    fn schema_with(names: &[&str]) -> Schema {
        Schema {
            elements: names
                .iter()
                .map(|name| ElementDecl {
                    name: name.to_string(),
                    namespace: None,
                    type_ref: TypeRef::AnyType,
                    nillable: false,
                    fixed: None,
                })
                .collect(),
            ..Schema::default()
        }
    }

    fn element(id: usize, min: u32, max: Option<u32>) -> Particle {
        Particle {
            min,
            max,
            term: Term::Element(id),
        }
    }

    fn matches(schema: &Schema, particle: &Particle, xml: &str) -> bool {
        let document = XmlDocument::parse(xml).unwrap();
        let children: Vec<&XmlElement> = document.root().child_elements().collect();
        schema.match_content(particle, &children).is_some()
    }

    #[test]
    fn test_sequence_with_optional_and_repeated() {
        let schema = schema_with(&["a", "b", "c"]);
        let model = Particle::once(Term::Sequence(vec![
            element(0, 1, Some(1)),
            element(1, 0, Some(1)),
            element(2, 1, None),
        ]));
        assert!(matches(&schema, &model, "<r><a/><b/><c/><c/></r>"));
        assert!(matches(&schema, &model, "<r><a/><c/></r>"));
        assert!(!matches(&schema, &model, "<r><a/><b/></r>"));
        assert!(!matches(&schema, &model, "<r><b/><a/><c/></r>"));
        assert!(!matches(&schema, &model, "<r><a/><c/><d/></r>"));
    }

    #[test]
    fn test_choice_repeated() {
        let schema = schema_with(&["a", "b"]);
        let model = Particle {
            min: 0,
            max: None,
            term: Term::Choice(vec![element(0, 1, Some(1)), element(1, 1, Some(1))]),
        };
        assert!(matches(&schema, &model, "<r/>"));
        assert!(matches(&schema, &model, "<r><b/><a/><b/></r>"));
    }

    #[test]
    fn test_max_occurs_bound() {
        let schema = schema_with(&["a"]);
        let model = Particle::once(Term::Sequence(vec![element(0, 2, Some(3))]));
        assert!(!matches(&schema, &model, "<r><a/></r>"));
        assert!(matches(&schema, &model, "<r><a/><a/><a/></r>"));
        assert!(!matches(&schema, &model, "<r><a/><a/><a/><a/></r>"));
    }

    #[test]
    fn test_nested_optional_sequence_does_not_loop() {
        let schema = schema_with(&["a"]);
        let inner = Particle {
            min: 0,
            max: None,
            term: Term::Sequence(vec![element(0, 0, Some(1))]),
        };
        let model = Particle::once(Term::Sequence(vec![inner]));
        assert!(matches(&schema, &model, "<r/>"));
        assert!(matches(&schema, &model, "<r><a/><a/></r>"));
    }

    #[test]
    fn test_huge_min_occurs_on_nullable_term_settles() {
        let schema = schema_with(&["a"]);
        let model = Particle {
            min: 4_000_000_000,
            max: Some(4_000_000_000),
            term: Term::Sequence(vec![element(0, 0, Some(1))]),
        };
        assert!(matches(&schema, &model, "<r/>"));
        assert!(matches(&schema, &model, "<r><a/><a/><a/></r>"));
    }

    #[test]
    fn test_huge_min_occurs_on_required_term_fails_fast() {
        let schema = schema_with(&["a"]);
        let model = Particle {
            min: 4_000_000_000,
            max: None,
            term: Term::Sequence(vec![element(0, 1, Some(1))]),
        };
        assert!(!matches(&schema, &model, "<r><a/><a/></r>"));
    }

    #[test]
    fn test_all_any_order() {
        let schema = schema_with(&["a", "b", "c"]);
        let model = Particle::once(Term::All(vec![
            element(0, 1, Some(1)),
            element(1, 1, Some(1)),
            element(2, 0, Some(1)),
        ]));
        assert!(matches(&schema, &model, "<r><b/><a/></r>"));
        assert!(matches(&schema, &model, "<r><c/><a/><b/></r>"));
        assert!(!matches(&schema, &model, "<r><a/></r>"));
        assert!(!matches(&schema, &model, "<r><a/><b/><a/></r>"));
    }

    #[test]
    fn test_attributions_follow_children() {
        let schema = schema_with(&["a", "b"]);
        let model = Particle::once(Term::Sequence(vec![element(0, 1, None), element(1, 1, Some(1))]));
        let document = XmlDocument::parse("<r><a/><a/><b/></r>").unwrap();
        let children: Vec<&XmlElement> = document.root().child_elements().collect();
        assert_eq!(
            schema.match_content(&model, &children),
            Some(vec![
                Attribution::Element(0),
                Attribution::Element(0),
                Attribution::Element(1)
            ])
        );
    }
}
