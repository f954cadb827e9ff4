use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::post};
use log::{error, info};
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::data::{TimetableInput, TimetableOutput};
use crate::error::TimetableError;
use crate::solver::HighsBackend;
use crate::timetable;

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
}

/// Errors as the HTTP client sees them.
pub enum ApiError {
    Timetable(TimetableError),
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Timetable(e @ TimetableError::Infeasible { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ApiError::Timetable(TimetableError::Backend(e)) => {
                error!("Timetable generation failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "timetable generation failed".to_string(),
                )
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "timetable generation failed".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn solve_handler(
    State(state): State<AppState>,
    Json(input): Json<TimetableInput>,
) -> Result<Json<TimetableOutput>, ApiError> {
    let seed = input
        .seed
        .or(state.config.seed)
        .unwrap_or_else(rand::random::<u64>);
    let backend = HighsBackend::new(state.config.solver.clone());

    let result = tokio::task::spawn_blocking(move || timetable::generate(&input, &backend, seed))
        .await
        .map_err(|e| {
            error!("Solver task did not finish: {}", e);
            ApiError::Internal
        })?;
    result.map(Json).map_err(ApiError::Timetable)
}

pub fn router(config: Config) -> Router {
    Router::new()
        .route("/v1/timetable/solve", post(solve_handler))
        .with_state(AppState {
            config: Arc::new(config),
        })
}

pub async fn run_server(config: Config) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, router(config)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BreakType, LabSessionRow, SectionRow, SubjectRow, TimeSlotRow};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/timetable/solve")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn lab_only_input(sections: &[&str]) -> TimetableInput {
        TimetableInput {
            sections: sections
                .iter()
                .map(|s| SectionRow {
                    year: "I".into(),
                    department: "ECE".into(),
                    section: (*s).into(),
                })
                .collect(),
            subjects: vec![SubjectRow {
                id: "EL".into(),
                name: "Electronics".into(),
            }],
            time_slots: vec![
                TimeSlotRow {
                    slot_id: "S1".into(),
                    ordinal: 1,
                    break_type: BreakType::None,
                },
                TimeSlotRow {
                    slot_id: "S2".into(),
                    ordinal: 2,
                    break_type: BreakType::None,
                },
            ],
            lab_sessions: sections
                .iter()
                .map(|s| LabSessionRow {
                    year: "I".into(),
                    department: "ECE".into(),
                    section: (*s).into(),
                    subject_id: "EL".into(),
                    faculty_id: "F1".into(),
                })
                .collect(),
            seed: Some(3),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn solves_a_small_request() {
        let body = serde_json::to_string(&lab_only_input(&["A"])).unwrap();
        let response = router(Config::default()).oneshot(request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["seed"], 3);
        assert_eq!(json["grids"][0]["section"], "I_ECE_A");
        let labs = json["grids"][0]["cells"]
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|row| row.as_array().unwrap())
            .filter(|cell| *cell == "Electronics (Lab)")
            .count();
        assert_eq!(labs, 2);
    }

    #[tokio::test]
    async fn too_many_labs_for_the_room_is_unprocessable() {
        // seven sections, six lab pairs in the week
        let input = lab_only_input(&["A", "B", "C", "D", "E", "F", "G"]);
        let body = serde_json::to_string(&input).unwrap();
        let response = router(Config::default()).oneshot(request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "no feasible solution found" })
        );
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let response = router(Config::default())
            .oneshot(request("{\"sections\": 1}".to_string()))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
