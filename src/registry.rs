//! Ordered client registry with exact-match lookup by client id.

// std
use std::collections::HashMap;

/// Entry that can be stored in a [`ClientRegistry`].
pub trait RegistryEntry {
	/// Identifier the entry is looked up by.
	fn id(&self) -> &str;
}

/// Read-only, ordered collection of registered clients.
///
/// Lookup is by exact, case-sensitive string equality. When the same id is registered more than
/// once the first entry wins; later duplicates stay reachable through [`ClientRegistry::iter`]
/// only.
#[derive(Clone, Debug)]
pub struct ClientRegistry<T> {
	entries: Vec<T>,
	index: HashMap<String, usize>,
}
impl<T> ClientRegistry<T>
where
	T: RegistryEntry,
{
	/// Build a registry from entries in priority order.
	pub fn new(entries: Vec<T>) -> Self {
		let mut index = HashMap::with_capacity(entries.len());

		for (position, entry) in entries.iter().enumerate() {
			index.entry(entry.id().to_owned()).or_insert(position);
		}

		Self { entries, index }
	}

	/// Resolve an entry by id.
	pub fn find(&self, id: &str) -> Option<&T> {
		self.index.get(id).map(|&position| &self.entries[position])
	}

	/// Ids registered more than once, in first-seen order.
	pub fn duplicate_ids(&self) -> Vec<&str> {
		let mut duplicates = Vec::new();

		for (position, entry) in self.entries.iter().enumerate() {
			let id = entry.id();

			if self.index.get(id) != Some(&position) && !duplicates.contains(&id) {
				duplicates.push(id);
			}
		}

		duplicates
	}

	/// Iterate entries in registration order.
	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.entries.iter()
	}

	/// Consume the registry, returning entries in registration order.
	pub fn into_entries(self) -> Vec<T> {
		self.entries
	}

	/// Number of registered entries, duplicates included.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether no entries are registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
impl<T> Default for ClientRegistry<T> {
	fn default() -> Self {
		Self { entries: Vec::new(), index: HashMap::new() }
	}
}
impl<T> FromIterator<T> for ClientRegistry<T>
where
	T: RegistryEntry,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = T>,
	{
		Self::new(iter.into_iter().collect())
	}
}
