// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::hash::Hash;

use hashbrown::HashMap;

use crate::slab::Token;

/// Identity keyed table from descriptions to the slab token of their authoritative record.
///
/// The table applies no policy.
#[derive(Debug)]
pub struct ObjectTable<D> {
    objects: HashMap<D, Token>,
}

impl<D> Default for ObjectTable<D> {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
        }
    }
}

impl<D> ObjectTable<D>
where
    D: Hash + Eq,
{
    /// Store the token of `description`, returning the token it replaces.
    pub fn put(&mut self, description: D, token: Token) -> Option<Token> {
        self.objects.insert(description, token)
    }

    /// Get the token of `description`.
    pub fn get(&self, description: &D) -> Option<Token> {
        self.objects.get(description).copied()
    }

    /// Remove `description` only if it still maps to `token`.
    pub fn remove(&mut self, description: &D, token: Token) -> bool {
        match self.objects.get(description) {
            Some(t) if *t == token => {
                self.objects.remove(description);
                true
            }
            _ => false,
        }
    }

    /// Count of descriptions in the table.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::Slab;

    #[test]
    fn test_remove_checks_token() {
        let mut slab = Slab::new();
        let old = slab.insert(());
        let new = slab.insert(());

        let mut table = ObjectTable::default();
        assert_eq!(table.put("a", old), None);
        assert_eq!(table.put("a", new), Some(old));

        assert!(!table.remove(&"a", old));
        assert_eq!(table.get(&"a"), Some(new));
        assert!(table.remove(&"a", new));
        assert!(table.is_empty());
    }
}
