use std::collections::HashMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;

use super::codec::decode_token;
use super::store::LocalStore;
use crate::error::{CodecError, PlanError, StoreError};

/// Query parameters of a share link, first value per key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(query).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "ignoring malformed query string");
            Vec::new()
        });
        let mut params = HashMap::with_capacity(pairs.len());
        for (key, value) in pairs {
            params.entry(key).or_insert(value);
        }
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// One calculator: its input model, how it projects, and how it is shared
/// and persisted.
pub trait Planner {
    type Model: Clone + Debug + PartialEq;
    type Edit;
    type Projection: Clone + Debug + PartialEq;

    fn defaults(this_year: i32) -> Self::Model;

    /// Resolves the model from the share query, then the store, then
    /// `defaults`, independently per field group.
    fn load(query: &QueryParams, store: &dyn LocalStore, defaults: Self::Model) -> Self::Model;

    fn project(model: &Self::Model, this_year: i32) -> Self::Projection;

    fn apply(model: &mut Self::Model, edit: Self::Edit, this_year: i32) -> Result<(), PlanError>;

    fn share_query(model: &Self::Model) -> Result<String, CodecError>;

    fn persist(model: &Self::Model, store: &mut dyn LocalStore);

    fn forget(store: &mut dyn LocalStore);
}

/// The single live copy of a planner's inputs and their projection.
///
/// Every change goes through [`Session::apply`], which recomputes the
/// projection and then commits: the share query is replaced and the store
/// rewritten. Nothing is committed until [`Session::hydrate`] has run, so
/// defaults never overwrite values that were not yet read.
#[derive(Debug)]
pub struct Session<P: Planner, S> {
    this_year: i32,
    model: P::Model,
    projection: P::Projection,
    store: S,
    share_query: String,
    hydrated: bool,
}

impl<P: Planner, S: LocalStore> Session<P, S> {
    pub fn new(store: S, this_year: i32) -> Self {
        let model = P::defaults(this_year);
        let projection = P::project(&model, this_year);
        Self {
            this_year,
            model,
            projection,
            store,
            share_query: String::new(),
            hydrated: false,
        }
    }

    pub fn hydrate(&mut self, query: &str) {
        let params = QueryParams::parse(query);
        self.model = P::load(&params, &self.store, P::defaults(self.this_year));
        self.recompute();
        self.hydrated = true;
        self.commit();
    }

    pub fn apply(&mut self, edit: P::Edit) -> Result<(), PlanError> {
        P::apply(&mut self.model, edit, self.this_year)?;
        self.recompute();
        self.commit();
        Ok(())
    }

    /// Forgets persisted inputs and returns to defaults with an empty share query.
    pub fn reset(&mut self) {
        P::forget(&mut self.store);
        self.model = P::defaults(self.this_year);
        self.recompute();
        self.share_query.clear();
    }

    pub fn model(&self) -> &P::Model {
        &self.model
    }

    pub fn projection(&self) -> &P::Projection {
        &self.projection
    }

    pub fn share_query(&self) -> &str {
        &self.share_query
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn this_year(&self) -> i32 {
        self.this_year
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn recompute(&mut self) {
        self.projection = P::project(&self.model, self.this_year);
    }

    fn commit(&mut self) {
        if !self.hydrated {
            return;
        }
        match P::share_query(&self.model) {
            Ok(query) => self.share_query = query,
            Err(e) => tracing::warn!(error = %e, "could not encode share query"),
        }
        P::persist(&self.model, &mut self.store);
    }
}

/// Decodes the query token under `param`, falling back to the stored record
/// under `key`. Either source failing to parse is skipped.
pub(crate) fn resolve<T: DeserializeOwned>(
    query: &QueryParams,
    param: &str,
    store: &dyn LocalStore,
    key: &str,
) -> Option<T> {
    if let Some(token) = query.get(param) {
        match decode_token(token) {
            Ok(value) => return Some(value),
            Err(e) => tracing::debug!(param, error = %e, "discarding share token"),
        }
    }
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(key, error = %e, "discarding stored record");
            None
        }
    }
}

/// Writes serialized records to `store` as one change. Best effort: a failed
/// write is logged and otherwise ignored.
pub(crate) fn save_records<'a, const N: usize>(
    store: &mut dyn LocalStore,
    records: [(&'a str, serde_json::Result<String>); N],
) {
    let result = records
        .into_iter()
        .map(|(key, json)| json.map(|json| (key, json)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
        .and_then(|entries| store.set_many(entries));
    if let Err(e) = result {
        tracing::warn!(error = %e, "could not persist planner inputs");
    }
}

pub(crate) fn forget_keys(store: &mut dyn LocalStore, keys: &[&str]) {
    for key in keys {
        if let Err(e) = store.remove(key) {
            tracing::warn!(key, error = %e, "could not clear planner inputs");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::store::MemoryStore;

    #[test]
    fn query_params_keep_first_value_and_skip_empty() {
        let params = QueryParams::parse("?y=2030&y=2031&m=&q=a%2Bb");
        assert_eq!(params.get("y"), Some("2030"));
        assert_eq!(params.get("m"), None);
        assert_eq!(params.get("q"), Some("a+b"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn resolve_prefers_query_then_store() {
        let mut store = MemoryStore::new();
        store.set("k", "[1,2]".to_string()).unwrap();

        let token = crate::state::codec::encode_token(&vec![9]).unwrap();
        let query = QueryParams::parse(&format!("p={}", token.replace('+', "%2B")));
        assert_eq!(resolve::<Vec<i32>>(&query, "p", &store, "k"), Some(vec![9]));

        let broken = QueryParams::parse("p=%25%25%25");
        assert_eq!(resolve::<Vec<i32>>(&broken, "p", &store, "k"), Some(vec![1, 2]));

        store.set("k", "{oops".to_string()).unwrap();
        assert_eq!(resolve::<Vec<i32>>(&broken, "p", &store, "k"), None);
    }
}
