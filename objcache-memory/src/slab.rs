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

/// Handle of a slab slot.
///
/// A token carries the generation of the slot it was issued for. Once the slot is freed the token never resolves
/// again, even if the slot is reused by a later insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    index: usize,
    generation: u64,
}

impl Token {
    /// Slot index of the token.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Generation of the token.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
enum Entry<T> {
    Vacant { next: usize, generation: u64 },
    Occupied { value: T, generation: u64 },
}

/// Generational arena with a free list.
#[derive(Debug)]
pub struct Slab<T> {
    entries: Vec<Entry<T>>,
    len: usize,
    next: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    /// Create an empty slab.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            len: 0,
            next: 0,
        }
    }

    /// Insert a value and return its token.
    pub fn insert(&mut self, value: T) -> Token {
        let index = self.next;
        self.len += 1;

        if index == self.entries.len() {
            self.entries.push(Entry::Occupied { value, generation: 0 });
            self.next = index + 1;
            return Token { index, generation: 0 };
        }

        let generation = match self.entries[index] {
            Entry::Vacant { next, generation } => {
                self.next = next;
                generation
            }
            Entry::Occupied { .. } => unreachable!("free list points to an occupied slot"),
        };
        self.entries[index] = Entry::Occupied { value, generation };
        Token { index, generation }
    }

    /// Remove the value of the token, if the token is still alive.
    pub fn remove(&mut self, token: Token) -> Option<T> {
        let entry = self.entries.get_mut(token.index)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == token.generation => {}
            _ => return None,
        }

        let vacant = Entry::Vacant {
            next: self.next,
            generation: token.generation.wrapping_add(1),
        };
        match std::mem::replace(entry, vacant) {
            Entry::Occupied { value, .. } => {
                self.len -= 1;
                self.next = token.index;
                Some(value)
            }
            Entry::Vacant { .. } => unreachable!(),
        }
    }

    /// Get the value of the token, if the token is still alive.
    pub fn get(&self, token: Token) -> Option<&T> {
        match self.entries.get(token.index) {
            Some(Entry::Occupied { value, generation }) if *generation == token.generation => Some(value),
            _ => None,
        }
    }

    /// Get the mutable value of the token, if the token is still alive.
    pub fn get_mut(&mut self, token: Token) -> Option<&mut T> {
        match self.entries.get_mut(token.index) {
            Some(Entry::Occupied { value, generation }) if *generation == token.generation => Some(value),
            _ => None,
        }
    }

    /// Returns `true` if the token is still alive.
    pub fn contains(&self, token: Token) -> bool {
        self.get(token).is_some()
    }

    /// Count of the occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
