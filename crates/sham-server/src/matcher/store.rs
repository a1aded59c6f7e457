//! Ordered matcher container.

use super::types::Matcher;
use std::collections::VecDeque;

/// Matchers in priority order: the most recently registered sits at the front.
///
/// Exhausted matchers stay in the store (and in `list`) but are skipped by
/// `eligible_mut`.
#[derive(Debug, Default)]
pub struct MatcherStore {
    matchers: VecDeque<Matcher>,
}

impl MatcherStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_front(&mut self, matcher: Matcher) {
        self.matchers.push_front(matcher);
    }

    pub fn get(&self, id: &str) -> Option<&Matcher> {
        self.matchers.iter().find(|m| m.id == id)
    }

    /// All matchers, front to back.
    pub fn iter(&self) -> impl Iterator<Item = &Matcher> {
        self.matchers.iter()
    }

    /// Remove by id. Returns `None` when no matcher had that id.
    pub fn remove(&mut self, id: &str) -> Option<Matcher> {
        let index = self.matchers.iter().position(|m| m.id == id)?;
        self.matchers.remove(index)
    }

    pub fn clear(&mut self) {
        self.matchers.clear();
    }

    /// Matchers still allowed to fire, front to back.
    pub fn eligible_mut(&mut self) -> impl Iterator<Item = &mut Matcher> {
        self.matchers.iter_mut().filter(|m| m.state.is_eligible())
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
