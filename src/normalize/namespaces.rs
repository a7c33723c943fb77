use std::collections::HashSet;

use crate::classify::namespace_depth;
use crate::data::osm::RawTag;

pub const DEFAULT_SEGMENT: &str = "default";

/// Prefixes that are also used as nesting parents on one element.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Collisions {
    /// `a` in any `a:b` or `a:b:c`.
    pub level1: HashSet<String>,
    /// `b` in any `a:b:c`.
    pub level2: HashSet<String>,
}

impl Collisions {
    /// Must run over the keys before any of them is rewritten.
    pub fn detect(tags: &[RawTag]) -> Collisions {
        let mut collisions = Collisions::default();
        for tag in tags {
            let segments: Vec<&str> = tag.key.split(':').collect();
            match segments.as_slice() {
                [first, _] => {
                    collisions.level1.insert(first.to_string());
                },
                [first, second, _] => {
                    collisions.level1.insert(first.to_string());
                    collisions.level2.insert(second.to_string());
                },
                _ => (),
            }
        }
        collisions
    }

    pub fn is_empty(&self) -> bool {
        self.level1.is_empty() && self.level2.is_empty()
    }

    /// The key this tag should be placed under, if it has to move.
    pub fn rewrite(&self, key: &str) -> Option<String> {
        let collides = match namespace_depth(key) {
            0 => self.level1.contains(key),
            1 => key.split(':').last().map_or(false, |segment| self.level2.contains(segment)),
            _ => false,
        };
        if collides {
            Some(format!("{}:{}", key, DEFAULT_SEGMENT))
        } else {
            None
        }
    }
}

/// Appends `:default` to every bare or shallow key that another key nests under.
/// Returns the number of rewritten keys.
pub fn disambiguate(tags: &mut [RawTag]) -> usize {
    let collisions = Collisions::detect(tags);
    if collisions.is_empty() {
        return 0;
    }

    let mut rewritten = 0;
    for tag in tags.iter_mut() {
        if let Some(key) = collisions.rewrite(&tag.key) {
            tag.key = key;
            rewritten += 1;
        }
    }
    rewritten
}
