use crate::errors::Error;
use crate::model::{AccelerationSensor, Device, NewDevice, NewPosition, Page, Position};
use crate::store::{DeviceRepository, TelemetryRepository};
use crate::validate::Validate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Clone)]
pub struct AppState {
    pub devices: Arc<dyn DeviceRepository>,
    pub telemetry: Arc<dyn TelemetryRepository>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    #[serde(alias = "userId")]
    owner: Uuid,
}

/// Optional owner check for single-device lookups
#[derive(Debug, Default, Deserialize)]
pub struct DeviceQuery {
    #[serde(alias = "userId")]
    owner: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(alias = "deviceId")]
    device_id: Uuid,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    #[serde(alias = "deviceId")]
    device_id: Uuid,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/devices", post(create_device).get(list_devices))
        .route("/api/v1/devices/:id", get(get_device))
        .route("/api/v1/devices/by-imei/:imei", get(get_device_by_imei))
        .route("/api/v1/positions", get(get_positions).post(create_position))
        .route("/api/v1/positions/latest", get(get_latest_position))
        .route("/api/v1/acceleration", get(get_acceleration))
        .with_state(state)
}

async fn create_device(
    State(state): State<AppState>,
    Json(device): Json<NewDevice>,
) -> Result<(StatusCode, Json<Device>), AppError> {
    if device.imei.trim().is_empty() {
        return Err(AppError::BadRequest("imei cannot be empty".to_string()));
    }

    let created = state.devices.create_device(device).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_devices(
    State(state): State<AppState>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<Vec<Device>>, AppError> {
    Ok(Json(state.devices.find_by_owner(params.owner).await?))
}

async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeviceQuery>,
) -> Result<Json<Device>, AppError> {
    state
        .devices
        .find_by_id(id)
        .await?
        .filter(|device| params.owner.map_or(true, |owner| owner == device.owner))
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Device {id} does not exist for this owner")))
}

async fn get_device_by_imei(
    State(state): State<AppState>,
    Path(imei): Path<String>,
) -> Result<Json<Device>, AppError> {
    state
        .devices
        .find_by_imei(&imei)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Device with imei {imei} does not exist")))
}

/// Stores a position and links it to its device. Live clients are not
/// notified; only MQTT reports reach the fan-out.
async fn create_position(
    State(state): State<AppState>,
    Json(position): Json<NewPosition>,
) -> Result<(StatusCode, Json<Position>), AppError> {
    position.validate()?;

    let device = state
        .devices
        .find_by_id(position.device)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Device {} does not exist", position.device))
        })?;

    let created = state.telemetry.insert_position(position).await?;
    state.devices.append_position(device.id, created.id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_positions(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Page<Position>>, AppError> {
    let (limit, offset) = paging(&params);
    let positions = state
        .telemetry
        .positions_for_device(params.device_id, limit, offset)
        .await?;
    let total = state.telemetry.count_positions(params.device_id).await?;

    Ok(Json(Page {
        total,
        data: positions,
        limit,
        offset,
    }))
}

async fn get_latest_position(
    State(state): State<AppState>,
    Query(params): Query<LatestQuery>,
) -> Result<Json<Position>, AppError> {
    state
        .telemetry
        .latest_position(params.device_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!("No positions for device {}", params.device_id))
        })
}

async fn get_acceleration(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Page<AccelerationSensor>>, AppError> {
    let (limit, offset) = paging(&params);
    let samples = state
        .telemetry
        .acceleration_for_device(params.device_id, limit, offset)
        .await?;
    let total = state.telemetry.count_acceleration(params.device_id).await?;

    Ok(Json(Page {
        total,
        data: samples,
        limit,
        offset,
    }))
}

fn paging(params: &HistoryQuery) -> (usize, usize) {
    (
        params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        params.offset.unwrap_or(0),
    )
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            AppError::Internal(e) => {
                error!("API error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {}", e),
                )
                    .into_response()
            }
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(_) => Self::BadRequest(err.to_string()),
            Error::DeviceNotFound(_) => Self::NotFound(err.to_string()),
            Error::DuplicateImei(_) => Self::Conflict(err.to_string()),
            other => Self::Internal(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn state() -> (Arc<MemoryStore>, AppState) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            devices: store.clone(),
            telemetry: store.clone(),
        };
        (store, state)
    }

    fn new_device(imei: &str) -> NewDevice {
        NewDevice {
            imei: imei.to_string(),
            ip: String::new(),
            inputs: 0,
            outputs: 0,
            led: 0,
            button: 0,
            owner: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch_device() {
        let (_store, state) = state();

        let (status, Json(created)) =
            create_device(State(state.clone()), Json(new_device("123")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(found) = get_device_by_imei(State(state), Path("123".to_string()))
            .await
            .unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_duplicate_imei_conflicts() {
        let (_store, state) = state();
        create_device(State(state.clone()), Json(new_device("123")))
            .await
            .unwrap();

        let result = create_device(State(state), Json(new_device("123"))).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_empty_imei_rejected() {
        let (_store, state) = state();

        let result = create_device(State(state), Json(new_device(" "))).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_unknown_imei_is_not_found() {
        let (_store, state) = state();

        let result = get_device_by_imei(State(state), Path("nope".to_string())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_positions_newest_first_and_latest() {
        let (store, state) = state();
        let device = Uuid::new_v4();
        for utc in [10, 30, 20] {
            store
                .insert_position(NewPosition {
                    latitude: 0.0,
                    longitude: 0.0,
                    altitude: 0.0,
                    utc,
                    device,
                })
                .await
                .unwrap();
        }

        let Json(page) = get_positions(
            State(state.clone()),
            Query(HistoryQuery {
                device_id: device,
                limit: Some(2),
                offset: None,
            }),
        )
        .await
        .unwrap();
        let utcs: Vec<i64> = page.data.iter().map(|p| p.utc).collect();
        assert_eq!(utcs, vec![30, 20]);
        assert_eq!(page.limit, 2);
        assert_eq!(page.total, 3);

        let Json(latest) = get_latest_position(
            State(state.clone()),
            Query(LatestQuery { device_id: device }),
        )
        .await
        .unwrap();
        assert_eq!(latest.utc, 30);

        let missing = get_latest_position(
            State(state),
            Query(LatestQuery {
                device_id: Uuid::new_v4(),
            }),
        )
        .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_devices_listed_by_owner() {
        let (_store, state) = state();
        let owner = Uuid::new_v4();
        for imei in ["2", "1"] {
            let mut device = new_device(imei);
            device.owner = owner;
            create_device(State(state.clone()), Json(device)).await.unwrap();
        }
        create_device(State(state.clone()), Json(new_device("3")))
            .await
            .unwrap();

        let uri: axum::http::Uri = format!("/api/v1/devices?userId={owner}").parse().unwrap();
        let query = Query::<OwnerQuery>::try_from_uri(&uri).unwrap();
        let Json(devices) = list_devices(State(state), query).await.unwrap();

        let imeis: Vec<&str> = devices.iter().map(|d| d.imei.as_str()).collect();
        assert_eq!(imeis, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_device_by_id_checks_owner() {
        let (_store, state) = state();
        let (_, Json(created)) = create_device(State(state.clone()), Json(new_device("123")))
            .await
            .unwrap();

        let Json(found) = get_device(
            State(state.clone()),
            Path(created.id),
            Query(DeviceQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(found.id, created.id);

        let Json(found) = get_device(
            State(state.clone()),
            Path(created.id),
            Query(DeviceQuery {
                owner: Some(created.owner),
            }),
        )
        .await
        .unwrap();
        assert_eq!(found.id, created.id);

        let other_owner = get_device(
            State(state),
            Path(created.id),
            Query(DeviceQuery {
                owner: Some(Uuid::new_v4()),
            }),
        )
        .await;
        assert!(matches!(other_owner, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_position_links_device() {
        let (store, state) = state();
        let (_, Json(device)) = create_device(State(state.clone()), Json(new_device("123")))
            .await
            .unwrap();

        let (status, Json(position)) = create_position(
            State(state),
            Json(NewPosition {
                latitude: 41.0,
                longitude: 2.0,
                altitude: 0.0,
                utc: 1000,
                device: device.id,
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(position.device, device.id);
        let stored = store.device(device.id).await.unwrap();
        assert_eq!(stored.positions, vec![position.id]);
    }

    #[tokio::test]
    async fn test_create_position_rejections() {
        let (store, state) = state();
        let (_, Json(device)) = create_device(State(state.clone()), Json(new_device("123")))
            .await
            .unwrap();

        let out_of_range = create_position(
            State(state.clone()),
            Json(NewPosition {
                latitude: 95.0,
                longitude: 2.0,
                altitude: 0.0,
                utc: 1000,
                device: device.id,
            }),
        )
        .await;
        assert!(matches!(out_of_range, Err(AppError::BadRequest(_))));

        let unknown_device = create_position(
            State(state),
            Json(NewPosition {
                latitude: 41.0,
                longitude: 2.0,
                altitude: 0.0,
                utc: 1000,
                device: Uuid::new_v4(),
            }),
        )
        .await;
        assert!(matches!(unknown_device, Err(AppError::NotFound(_))));
        assert_eq!(store.position_count().await, 0);
    }

    #[test]
    fn test_paging_caps_limit() {
        let params = HistoryQuery {
            device_id: Uuid::nil(),
            limit: Some(50_000),
            offset: Some(5),
        };
        assert_eq!(paging(&params), (MAX_LIMIT, 5));
    }
}
