// ABOUTME: Facility location directory client with a TTL cache and nearest lookup
// ABOUTME: Caller-owned cache value type replaces the original's module-level singletons

use std::time::{Duration, Instant};

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use validator::Validate;

use crate::AppState;
use crate::error::{AppError, Result};
use crate::generate::OpenAiClient;
use crate::types::{LocationSearchQuery, NearestQuery};

const DIRECTORY_TTL: Duration = Duration::from_secs(10 * 60);
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A cached value with an explicit fetch timestamp, owned by the client that
/// populated it.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub fetched_at: Instant,
}

impl<T> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Site {
    pub site_id: i64,
    pub site_name: String,
    #[serde(default)]
    pub region_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    pub location_id: i64,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub addr1: String,
    #[serde(default)]
    pub addr2: Option<String>,
    pub city: String,
    pub state_province: String,
    #[serde(default)]
    pub site_name: String,
}

impl Location {
    pub fn display_address(&self) -> String {
        let addr2 = self
            .addr2
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(|a| format!(", {}", a))
            .unwrap_or_default();
        format!(
            "{} ({}{}, {}, {})",
            self.location_name, self.addr1, addr2, self.city, self.state_province
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse<T> {
    items: Vec<T>,
}

pub struct LocationDirectory {
    http: reqwest::Client,
    base_url: String,
    ttl: Duration,
    cache: RwLock<Option<Cached<Vec<Location>>>>,
}

impl LocationDirectory {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            ttl: DIRECTORY_TTL,
            cache: RwLock::new(None),
        }
    }

    pub async fn sites(&self) -> Result<Vec<Site>> {
        let response: ItemsResponse<Site> = self
            .http
            .get(format!("{}/sites.json", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.items)
    }

    pub async fn locations_for_site(&self, site_id: i64) -> Result<Vec<Location>> {
        let response: ItemsResponse<Location> = self
            .http
            .get(format!("{}/locations/{}.json", self.base_url, site_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.items)
    }

    /// All locations across all sites, served from the TTL cache when fresh.
    pub async fn all(&self) -> Result<Vec<Location>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh(self.ttl) {
                    return Ok(cached.value.clone());
                }
            }
        }

        let mut all = Vec::new();
        for site in self.sites().await? {
            all.extend(self.locations_for_site(site.site_id).await?);
        }

        let mut cache = self.cache.write().await;
        *cache = Some(Cached::new(all.clone()));
        Ok(all)
    }

    /// Nearest location to the given coordinates, by great-circle distance.
    pub async fn nearest(&self, lat: f64, lng: f64) -> Result<Option<Location>> {
        let locations = self.all().await?;
        Ok(locations.into_iter().min_by(|a, b| {
            let da = haversine_m(lat, lng, a.latitude, a.longitude);
            let db = haversine_m(lat, lng, b.latitude, b.longitude);
            da.total_cmp(&db)
        }))
    }

    /// Match a spoken/typed location name against the directory via the LLM.
    pub async fn search(&self, query: &str, openai: &OpenAiClient) -> Result<Option<Location>> {
        let locations = self.all().await?;
        if locations.is_empty() {
            return Ok(None);
        }

        let listing: Vec<(String, i64)> = locations
            .iter()
            .map(|l| (l.location_name.clone(), l.location_id))
            .collect();

        let reply = openai
            .chat(
                json!([
                    {
                        "role": "system",
                        "content": "You are a location matching assistant. Given a user query \
                                    and a list of locations, find the most relevant location ID \
                                    that matches the query. Return ONLY the ID number, no other \
                                    text.",
                    },
                    {
                        "role": "user",
                        "content": format!(
                            "Find the location ID that best matches: \"{}\"\n\nLocations: {}",
                            query,
                            serde_json::to_string(&listing)
                                .map_err(|e| AppError::Internal(e.to_string()))?
                        ),
                    },
                ]),
                20,
            )
            .await?;

        let Ok(location_id) = reply.trim().parse::<i64>() else {
            return Ok(None);
        };
        Ok(locations.into_iter().find(|l| l.location_id == location_id))
    }
}

fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

// Route handlers

pub async fn get_sites(State(state): State<AppState>) -> Result<Json<Vec<Site>>> {
    Ok(Json(state.locations.sites().await?))
}

pub async fn site_locations(
    State(state): State<AppState>,
    Path(site_id): Path<i64>,
) -> Result<Json<Vec<Location>>> {
    Ok(Json(state.locations.locations_for_site(site_id).await?))
}

pub async fn nearest(
    State(state): State<AppState>,
    Query(query): Query<NearestQuery>,
) -> Result<Json<Location>> {
    state
        .locations
        .nearest(query.lat, query.lng)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Location not found".to_string()))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<LocationSearchQuery>,
) -> Result<Json<Location>> {
    query.validate()?;

    state
        .locations
        .search(&query.q, &state.openai)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Location not found".to_string()))
}
