//! HTTP surface for the predictor: one status route and one inference route.
//!
//! The loaded artifact bundle is read-only shared state. A service that
//! failed to load its artifacts still starts, reports itself degraded on
//! `GET /`, and fails fast on `POST /predict`.

use crate::model::ModelBundle;
use crate::predict::predict_top_n;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Immutable per-process context, constructed once at startup and shared by
/// every request. `bundle` is `None` when the service is degraded.
pub struct ServiceState {
    bundle: Option<ModelBundle>,
    top_n: usize,
}

impl ServiceState {
    pub fn new(bundle: Option<ModelBundle>, top_n: usize) -> Self {
        Self { bundle, top_n }
    }

    pub fn ready(&self) -> bool {
        self.bundle.is_some()
    }
}

pub fn build_router(state: Arc<ServiceState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .layer(cors)
        .with_state(state)
}

/// Binds the listener and serves until the process is stopped.
pub async fn serve(state: Arc<ServiceState>, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("prognos predictor listening on http://{addr}");
    axum::serve(listener, build_router(state)).await
}

async fn home(State(state): State<Arc<ServiceState>>) -> Json<Value> {
    let model_status = if state.ready() {
        "Classifier, feature names, and label encoder loaded successfully."
    } else {
        "Model artifacts failed to load. Check server logs."
    };
    Json(json!({
        "message": "Disease prediction service is running.",
        "model_status": model_status,
    }))
}

async fn predict(
    State(state): State<Arc<ServiceState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            log::warn!("Rejected predict request: {rejection}");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "No JSON data received" })),
            );
        }
    };

    let symptoms = match parse_known_symptoms(&body) {
        Ok(symptoms) => symptoms,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message })));
        }
    };

    let Some(bundle) = state.bundle.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Model or related artifacts not loaded. Check server logs."
            })),
        );
    };

    match predict_top_n(bundle, &symptoms, state.top_n) {
        Ok(predictions) => (StatusCode::OK, Json(json!({ "predictions": predictions }))),
        Err(err) => {
            log::error!("Prediction failed: {err:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "An internal error occurred during prediction" })),
            )
        }
    }
}

/// Validates the request shape: a `known_symptoms` object mapping symptom
/// name to a numeric presence indicator.
fn parse_known_symptoms(body: &Value) -> Result<HashMap<String, f64>, String> {
    let Some(value) = body.get("known_symptoms") else {
        return Err("Missing 'known_symptoms' key (must be an object) in JSON data".to_string());
    };
    let Some(entries) = value.as_object() else {
        return Err("'known_symptoms' must be an object mapping symptom name to 0/1".to_string());
    };

    let mut symptoms = HashMap::with_capacity(entries.len());
    for (name, indicator) in entries {
        let Some(indicator) = indicator.as_f64() else {
            return Err(format!("Symptom '{name}' has a non-numeric value"));
        };
        symptoms.insert(name.clone(), indicator);
    }
    Ok(symptoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelEncoder;
    use crate::model::LinearClassifier;
    use ndarray::array;

    fn ready_state() -> Arc<ServiceState> {
        let classifier = LinearClassifier {
            n_classes: 3,
            weights: array![
                [-1.0, -1.0, 2.0],
                [-2.0, 2.0, -1.0],
                [2.0, 1.0, -1.0]
            ],
            intercepts: array![-1.0, -1.0, -2.0],
        };
        let encoder = LabelEncoder::fit(&[
            "Flu".to_string(),
            "Cold".to_string(),
            "Allergy".to_string(),
        ])
        .unwrap();
        let bundle = ModelBundle {
            classifier,
            feature_names: vec!["fever".into(), "cough".into(), "fatigue".into()],
            encoder,
        };
        Arc::new(ServiceState::new(Some(bundle), 3))
    }

    fn degraded_state() -> Arc<ServiceState> {
        Arc::new(ServiceState::new(None, 3))
    }

    #[tokio::test]
    async fn home_reports_loaded_bundle() {
        let Json(body) = home(State(ready_state())).await;
        assert_eq!(body["message"], "Disease prediction service is running.");
        assert!(
            body["model_status"]
                .as_str()
                .unwrap()
                .contains("loaded successfully")
        );
    }

    #[tokio::test]
    async fn home_reports_degraded_bundle() {
        let Json(body) = home(State(degraded_state())).await;
        assert!(
            body["model_status"]
                .as_str()
                .unwrap()
                .contains("failed to load")
        );
    }

    #[tokio::test]
    async fn predict_succeeds_with_ranked_output() {
        let payload = json!({ "known_symptoms": { "fever": 1, "cough": 1 } });
        let (status, Json(body)) = predict(State(ready_state()), Ok(Json(payload))).await;
        assert_eq!(status, StatusCode::OK);

        let predictions = body["predictions"].as_array().unwrap();
        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions[0]["disease"], "Flu");
        for entry in predictions {
            let rendered = entry["probability"].as_str().unwrap();
            assert!(rendered.ends_with('%'));
        }
    }

    #[tokio::test]
    async fn predict_fails_fast_when_degraded() {
        let payload = json!({ "known_symptoms": { "fever": 1 } });
        let (status, Json(body)) = predict(State(degraded_state()), Ok(Json(payload))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("not loaded"));
    }

    #[tokio::test]
    async fn predict_rejects_missing_known_symptoms_key() {
        let payload = json!({ "symptoms": { "fever": 1 } });
        let (status, Json(body)) = predict(State(ready_state()), Ok(Json(payload))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("known_symptoms"));
    }

    #[tokio::test]
    async fn predict_rejects_non_object_known_symptoms() {
        let payload = json!({ "known_symptoms": [1, 2, 3] });
        let (status, Json(body)) = predict(State(ready_state()), Ok(Json(payload))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("object"));
    }

    #[tokio::test]
    async fn predict_rejects_non_numeric_indicator() {
        let payload = json!({ "known_symptoms": { "fever": "yes" } });
        let (status, Json(body)) = predict(State(ready_state()), Ok(Json(payload))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("fever"));
    }

    #[test]
    fn parse_accepts_an_empty_symptom_map() {
        let body = json!({ "known_symptoms": {} });
        let symptoms = parse_known_symptoms(&body).unwrap();
        assert!(symptoms.is_empty());
    }
}
