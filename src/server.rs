use crate::{
    config::{Config, DiseaseConfig},
    routes::api_routes,
    state::Models,
    telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Room for multipart boundaries and part headers on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct SharedState {
    pub models: Models,
    pub disease: DiseaseConfig,
    pub metrics: Arc<Metrics>,
}

pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.disease.max_upload_bytes + MULTIPART_OVERHEAD;
    let metrics_layer = HttpMetricsLayerBuilder::new().build();

    Router::new()
        .merge(api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(metrics_layer)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(models: Models, config: &Config) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let app_state = SharedState {
            models,
            disease: config.disease.clone(),
            metrics: Arc::new(Metrics::new()?),
        };

        let router = build_router(app_state);
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        mut shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok(())
        });

        Ok(server_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::CROP_LABELS,
        model_service::{ClassLabel, ImageModel, ModelError, TabularModel, TabularPrediction},
        routes::{CropPrediction, DiseasePrediction, FertilizerPrediction, STATUS_MESSAGE},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
        response::Response,
    };
    use image::{ImageBuffer, ImageFormat, Rgb};
    use ndarray::{Array, Ix4};
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
    };
    use tower::ServiceExt;

    const BOUNDARY: &str = "agri-test-boundary";

    struct MockTabularModel {
        label: ClassLabel,
        probabilities: Vec<f32>,
        seen: Arc<Mutex<Vec<Vec<f32>>>>,
    }

    impl MockTabularModel {
        fn new(label: ClassLabel, probabilities: Vec<f32>) -> Self {
            Self {
                label,
                probabilities,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl TabularModel for MockTabularModel {
        fn predict(&self, features: &[f32]) -> Result<TabularPrediction, ModelError> {
            self.seen.lock().unwrap().push(features.to_vec());
            Ok(TabularPrediction {
                label: self.label.clone(),
                probabilities: self.probabilities.clone(),
            })
        }
    }

    struct FailingTabularModel;

    impl TabularModel for FailingTabularModel {
        fn predict(&self, _features: &[f32]) -> Result<TabularPrediction, ModelError> {
            Err(ModelError::Inference("shape mismatch".to_string()))
        }
    }

    struct MockImageModel {
        scores: Vec<f32>,
        seen_shapes: Arc<Mutex<Vec<Vec<usize>>>>,
    }

    impl MockImageModel {
        fn new(scores: Vec<f32>) -> Self {
            Self {
                scores,
                seen_shapes: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl ImageModel for MockImageModel {
        fn predict(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, ModelError> {
            self.seen_shapes.lock().unwrap().push(input.shape().to_vec());
            Ok(self.scores.clone())
        }
    }

    fn disease_config() -> DiseaseConfig {
        DiseaseConfig {
            input_size: 64,
            max_upload_bytes: 4096,
        }
    }

    fn app(models: Models) -> Router {
        build_router(SharedState {
            models,
            disease: disease_config(),
            metrics: Arc::new(Metrics::new().unwrap()),
        })
    }

    fn default_models() -> Models {
        Models::new(
            MockTabularModel::new(ClassLabel::Index(20), vec![0.1, 0.9]),
            MockTabularModel::new(ClassLabel::Name("Urea".to_string()), vec![0.8, 0.2]),
            MockImageModel::new(vec![0.05, 0.9, 0.05]),
        )
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"leaf\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/predict/disease")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb([30, 160, 40]));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn crop_body() -> serde_json::Value {
        serde_json::json!({
            "nitrogen": 90, "phosphorus": 42, "potassium": 43,
            "temperature": 20.5, "humidity": 82.0, "ph": 6.5, "rainfall": 202.25
        })
    }

    fn fertilizer_body(soil: &str, crop: &str) -> serde_json::Value {
        serde_json::json!({
            "temperature": 26.0, "moisture": 0.5, "rainfall": 110.0, "ph": 6.8,
            "nitrogen": 37, "phosphorus": 20, "potassium": 12, "carbon": 1.1,
            "soil": soil, "crop": crop
        })
    }

    #[tokio::test]
    async fn test_healthcheck() {
        let response = app(default_models())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["message"], STATUS_MESSAGE);
    }

    #[tokio::test]
    async fn test_predict_crop_returns_known_label() {
        let crop_model = MockTabularModel::new(ClassLabel::Index(20), vec![0.1, 0.9]);
        let seen = crop_model.seen.clone();
        let models = Models::new(
            crop_model,
            MockTabularModel::new(ClassLabel::Index(0), vec![1.0]),
            MockImageModel::new(vec![1.0]),
        );

        let response = app(models)
            .oneshot(json_request("/predict/crop", crop_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let prediction: CropPrediction =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(prediction.crop, "rice");
        assert!(CROP_LABELS.contains(&prediction.crop.as_str()));
        assert!((prediction.confidence - 90.0).abs() < 1e-4);
        assert!(prediction.image_url.starts_with("https://"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], vec![90.0, 42.0, 43.0, 20.5, 82.0, 6.5, 202.25]);
    }

    #[tokio::test]
    async fn test_predict_crop_response_uses_camel_case() {
        let response = app(default_models())
            .oneshot(json_request("/predict/crop", crop_body()))
            .await
            .unwrap();

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body.get("imageUrl").is_some());
        assert!(body.get("image_url").is_none());
    }

    #[tokio::test]
    async fn test_predict_crop_missing_field_is_bad_request() {
        let mut body = crop_body();
        body.as_object_mut().unwrap().remove("ph");

        let response = app(default_models())
            .oneshot(json_request("/predict/crop", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("ph"));
    }

    #[tokio::test]
    async fn test_predict_crop_out_of_range_index_is_server_error() {
        let models = Models::new(
            MockTabularModel::new(ClassLabel::Index(42), vec![1.0]),
            MockTabularModel::new(ClassLabel::Index(0), vec![1.0]),
            MockImageModel::new(vec![1.0]),
        );

        let response = app(models)
            .oneshot(json_request("/predict/crop", crop_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("42"));
    }

    #[tokio::test]
    async fn test_model_failure_surfaces_message_as_500() {
        let models = Models::new(
            FailingTabularModel,
            MockTabularModel::new(ClassLabel::Index(0), vec![1.0]),
            MockImageModel::new(vec![1.0]),
        );

        let response = app(models)
            .oneshot(json_request("/predict/crop", crop_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "inference failed: shape mismatch");
    }

    #[tokio::test]
    async fn test_predict_fertilizer() {
        let fertilizer_model =
            MockTabularModel::new(ClassLabel::Name("DAP".to_string()), vec![0.15, 0.85]);
        let seen = fertilizer_model.seen.clone();
        let models = Models::new(
            MockTabularModel::new(ClassLabel::Index(0), vec![1.0]),
            fertilizer_model,
            MockImageModel::new(vec![1.0]),
        );

        let response = app(models)
            .oneshot(json_request(
                "/predict/fertilizer",
                fertilizer_body("Loamy", "Wheat"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let prediction: FertilizerPrediction =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(prediction.fertilizer, "DAP");
        assert!((prediction.confidence - 85.0).abs() < 1e-4);
        assert_eq!(
            prediction.description,
            "This balanced fertilizer is ideal for your soil conditions and crop type."
        );

        let seen = seen.lock().unwrap();
        assert_eq!(&seen[0][8..], &[1.0, 1.0]);
    }

    #[tokio::test]
    async fn test_predict_fertilizer_unknown_categories_encode_to_sentinel() {
        let fertilizer_model = MockTabularModel::new(ClassLabel::Index(3), vec![1.0]);
        let seen = fertilizer_model.seen.clone();
        let models = Models::new(
            MockTabularModel::new(ClassLabel::Index(0), vec![1.0]),
            fertilizer_model,
            MockImageModel::new(vec![1.0]),
        );

        let response = app(models)
            .oneshot(json_request(
                "/predict/fertilizer",
                fertilizer_body("Peaty", "Quinoa"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let prediction: FertilizerPrediction =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(prediction.fertilizer, "3");

        let seen = seen.lock().unwrap();
        assert_eq!(&seen[0][8..], &[-1.0, -1.0]);
    }

    #[tokio::test]
    async fn test_predict_disease_resizes_and_labels() {
        let disease_model = MockImageModel::new(vec![0.05, 0.15, 0.05, 0.05, 0.7]);
        let seen_shapes = disease_model.seen_shapes.clone();
        let models = Models::new(
            MockTabularModel::new(ClassLabel::Index(0), vec![1.0]),
            MockTabularModel::new(ClassLabel::Index(0), vec![1.0]),
            disease_model,
        );

        let response = app(models)
            .oneshot(multipart_request("file", "image/png", &png(10, 30)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let prediction: DiseasePrediction =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(prediction.disease, "Corn (maize) - Common rust ");
        assert!((prediction.confidence - 70.0).abs() < 1e-4);
        assert_eq!(
            prediction.remedies,
            vec![
                "Plant resistant varieties.".to_string(),
                "Apply fungicides at the first sign of disease.".to_string()
            ]
        );

        assert_eq!(seen_shapes.lock().unwrap()[0], vec![1, 64, 64, 3]);
    }

    #[tokio::test]
    async fn test_predict_disease_out_of_range_index_is_unknown() {
        let mut scores = vec![0.0; 20];
        scores[17] = 0.99;
        let models = Models::new(
            MockTabularModel::new(ClassLabel::Index(0), vec![1.0]),
            MockTabularModel::new(ClassLabel::Index(0), vec![1.0]),
            MockImageModel::new(scores),
        );

        let response = app(models)
            .oneshot(multipart_request("file", "image/png", &png(80, 80)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let prediction: DiseasePrediction =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(prediction.disease, "Unknown Class (index: 17)");
        assert_eq!(
            prediction.remedies,
            vec!["Cannot determine remedy for unknown class.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_predict_disease_wrong_content_type_is_bad_request() {
        let response = app(default_models())
            .oneshot(multipart_request("file", "image/gif", b"GIF89a...."))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Only JPEG and PNG"));
    }

    #[tokio::test]
    async fn test_predict_disease_oversized_upload_is_bad_request() {
        let oversized = vec![0u8; disease_config().max_upload_bytes + 1];

        let response = app(default_models())
            .oneshot(multipart_request("file", "image/jpeg", &oversized))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("limit"));
    }

    #[tokio::test]
    async fn test_predict_disease_undecodable_image_is_bad_request() {
        let response = app(default_models())
            .oneshot(multipart_request("file", "image/png", b"not really a png"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_disease_missing_field_is_bad_request() {
        let response = app(default_models())
            .oneshot(multipart_request("image", "image/png", &png(8, 8)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("`file`"));
    }

    #[tokio::test]
    async fn test_predict_disease_without_multipart_is_bad_request() {
        let response = app(default_models())
            .oneshot(json_request("/predict/disease", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_reports_predictions() {
        let app = app(default_models());

        let response = app
            .clone()
            .oneshot(json_request("/predict/crop", crop_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("requests_total"));
    }
}
