use crate::error::{QueryError, Result};
use crate::profile::ClientProfiles;
use dtm_matrix_store::{Edge, MatrixReader, PostalCode};
use dtm_protocol::{OriginsResponse, PairResponse, ProfileResponse, RowEntry, RowResponse};
use std::sync::Arc;

/// Translates request parameters into matrix reads and shapes the responses.
///
/// Parameters arrive as the raw strings the caller sent; absence, padding and integer parsing
/// are handled here so every entry point behaves the same.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn MatrixReader>,
    profiles: Arc<ClientProfiles>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn MatrixReader>, profiles: ClientProfiles) -> Self {
        Self {
            store,
            profiles: Arc::new(profiles),
        }
    }

    /// Full row for `origin`, or only destinations within `max_time` minutes when given.
    ///
    /// The threshold goes to the store's filtered scan rather than being applied here.
    pub fn row(&self, origin: Option<&str>, max_time: Option<&str>) -> Result<RowResponse> {
        let origin = required("origin", origin)?;
        let max_time = max_time
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| parse_minutes("maxTime", raw))
            .transpose()?;

        let code = self.known_origin(origin)?;
        let edges = match max_time {
            Some(max_time) => self.store.lookup_row_filtered(&code, max_time)?,
            None => self.store.lookup_row(&code)?,
        };
        log::debug!(
            "row origin={} max_time={:?} -> {} destinations",
            code,
            max_time,
            edges.len()
        );

        let results = edges.iter().map(row_entry).collect();
        Ok(RowResponse::new(code.into_string(), results))
    }

    pub fn pair(&self, origin: Option<&str>, dest: Option<&str>) -> Result<PairResponse> {
        let origin = required("origin", origin)?;
        let dest = required("dest", dest)?;
        let origin = self.known_origin(origin)?;
        let dest = self.known_code("destination", dest)?;

        let edge = self
            .store
            .lookup_pair(&origin, &dest)?
            .ok_or_else(|| QueryError::NotFound(format!("pair {origin}-{dest}")))?;
        Ok(PairResponse {
            origin_pc4: edge.from.to_string(),
            dest_pc4: edge.to.to_string(),
            time_min: edge.time_minutes,
            distance_km: edge.distance_km(),
        })
    }

    pub fn origins(&self) -> Result<OriginsResponse> {
        let origins = self
            .store
            .list_origins()?
            .into_iter()
            .map(PostalCode::into_string)
            .collect();
        Ok(OriginsResponse { origins })
    }

    /// Plan metadata for an authenticated credential.
    pub fn profile(&self, credential: &str) -> ProfileResponse {
        ProfileResponse::from(self.profiles.resolve(credential))
    }

    fn known_origin(&self, raw: &str) -> Result<PostalCode> {
        self.known_code("origin", raw)
    }

    /// Canonical code that appears in the matrix. Unparseable codes cannot be in it either.
    fn known_code(&self, role: &str, raw: &str) -> Result<PostalCode> {
        let not_found = || QueryError::NotFound(format!("{role} {}", raw.trim()));
        let code = PostalCode::parse(raw).map_err(|_| not_found())?;
        if self.store.contains_origin(&code)? {
            Ok(code)
        } else {
            Err(QueryError::NotFound(format!("{role} {code}")))
        }
    }
}

fn required<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(QueryError::MissingParameter(name)),
    }
}

fn parse_minutes(name: &'static str, raw: &str) -> Result<i64> {
    raw.parse().map_err(|_| QueryError::InvalidParameter {
        name,
        value: raw.to_string(),
    })
}

fn row_entry(edge: &Edge) -> RowEntry {
    RowEntry {
        dest_pc4: edge.to.to_string(),
        time_min: edge.time_minutes,
        distance_km: edge.distance_km(),
    }
}
