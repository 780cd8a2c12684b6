//! Server Query Endpoint
//!
//! `GET /servers?name=a,b&tag=x` runs an index query with one name filter per
//! listed name and one tag filter per listed tag. Without parameters the full
//! snapshot is returned.

use super::state::AppState;
use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use serverfinder_core::{Filter, Record};

#[derive(Debug, Default, Deserialize)]
pub struct ServersQuery {
    /// Comma-separated service names
    pub name: Option<String>,
    /// Comma-separated tags
    pub tag: Option<String>,
}

impl ServersQuery {
    fn filters(&self) -> Vec<Filter> {
        fn split(list: &Option<String>) -> impl Iterator<Item = &str> {
            list.as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
        }

        split(&self.name)
            .map(Filter::name)
            .chain(split(&self.tag).map(Filter::tag))
            .collect()
    }
}

/// GET /servers
#[tracing::instrument(skip(state))]
pub async fn list_servers(
    State(state): State<AppState>,
    Query(query): Query<ServersQuery>,
) -> Json<Vec<Record>> {
    let filters = query.filters();
    if filters.is_empty() {
        Json(state.index.all())
    } else {
        Json(state.index.query(&filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serverfinder_core::ServerIndex;
    use std::sync::Arc;

    #[test]
    fn test_query_params_become_filters() {
        let query = ServersQuery {
            name: Some("svc1, svc2".to_string()),
            tag: Some("web,".to_string()),
        };
        assert_eq!(
            query.filters(),
            vec![Filter::name("svc1"), Filter::name("svc2"), Filter::tag("web")]
        );
        assert!(ServersQuery::default().filters().is_empty());
    }

    #[tokio::test]
    async fn test_list_servers_filters_index() {
        let index = Arc::new(ServerIndex::new());
        index.replace(vec![
            Record::new("svc1", "10.0.0.1", 80).with_tag("web"),
            Record::new("svc2", "10.0.0.2", 80).with_tag("db"),
        ]);
        let state = AppState::new(index);

        let Json(all) = list_servers(State(state.clone()), Query(ServersQuery::default())).await;
        assert_eq!(all.len(), 2);

        let query = ServersQuery {
            tag: Some("db".to_string()),
            ..ServersQuery::default()
        };
        let Json(found) = list_servers(State(state), Query(query)).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "svc2");
    }
}
