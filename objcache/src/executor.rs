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

/// Caller-supplied steps of [`crate::CacheSession::find_objects_and_execute`].
pub trait CacheExecutor<D, V> {
    /// Build the objects of `missing`, in the same order.
    ///
    /// Called inside the critical sections of the missing objects, at most once per batch and only if at least one
    /// object is missing.
    fn create(&mut self, missing: &[D]) -> anyhow::Result<Vec<V>>;

    /// Receive an object of the batch, in the order of the descriptions.
    fn exists(&mut self, description: &D, value: &V) -> anyhow::Result<()> {
        let _ = (description, value);
        Ok(())
    }

    /// Run the work that needs the objects, while the batch still holds its locks.
    fn execute(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Executor behind [`crate::CacheSession::find_or_create`].
pub(crate) struct SingleObjectExecutor<F, V> {
    builder: Option<F>,
    object: Option<V>,
}

impl<F, V> SingleObjectExecutor<F, V> {
    pub fn new(builder: F) -> Self {
        Self {
            builder: Some(builder),
            object: None,
        }
    }

    pub fn into_object(self) -> Option<V> {
        self.object
    }
}

impl<D, V, F> CacheExecutor<D, V> for SingleObjectExecutor<F, V>
where
    V: Clone,
    F: FnOnce(&D) -> anyhow::Result<V>,
{
    fn create(&mut self, missing: &[D]) -> anyhow::Result<Vec<V>> {
        let builder = self
            .builder
            .take()
            .ok_or_else(|| anyhow::anyhow!("object builder called twice"))?;
        let [description] = missing else {
            anyhow::bail!("expected exactly one missing object, got {}", missing.len());
        };
        Ok(vec![builder(description)?])
    }

    fn exists(&mut self, _: &D, value: &V) -> anyhow::Result<()> {
        self.object = Some(value.clone());
        Ok(())
    }
}
