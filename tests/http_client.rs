//! HTTP client tests against an in-process mock of the inpainting API

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imgly_inpaint::{
    error::{InpaintError, Result},
    HttpInpaintClient, ImagePayload, ImagePoint, InpaintConfig, InpaintService, JobId, MaskRaster,
    SubmissionRequest, Workflow,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct ReceivedField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Ok,
    OkWithoutJobId,
    ServerError,
    Slow,
}

struct ServerState {
    mode: Mode,
    result_png: Vec<u8>,
    received: Mutex<Vec<Vec<ReceivedField>>>,
}

async fn inpaint_handler(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> std::result::Result<Json<serde_json::Value>, StatusCode> {
    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?.to_vec();
        fields.push(ReceivedField {
            name,
            file_name,
            content_type,
            data,
        });
    }
    state.received.lock().unwrap().push(fields);

    let data_url = format!("data:image/png;base64,{}", STANDARD.encode(&state.result_png));
    match state.mode {
        Mode::Ok => Ok(Json(json!({ "result_image": data_url, "job_id": "job-abc" }))),
        Mode::OkWithoutJobId => Ok(Json(json!({ "result_image": data_url }))),
        Mode::ServerError => Err(StatusCode::INTERNAL_SERVER_ERROR),
        Mode::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Json(json!({ "result_image": data_url, "job_id": "too-late" })))
        },
    }
}

async fn job_handler(Path(job_id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "job_id": job_id, "status": "completed", "iterations": 2 }))
}

async fn spawn_server(mode: Mode) -> (SocketAddr, Arc<ServerState>) {
    let state = Arc::new(ServerState {
        mode,
        result_png: encode_png(4, 4),
        received: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/api/inpaint/", post(inpaint_handler))
        .route("/api/jobs/:job_id/", get(job_handler))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([180, 180, 180, 255]),
    ));
    let mut buffer = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

fn client_for(addr: SocketAddr, timeout_secs: u64) -> HttpInpaintClient {
    let config = InpaintConfig::builder()
        .api_base_url(format!("http://{}/api", addr))
        .request_timeout_secs(timeout_secs)
        .build()
        .unwrap();
    HttpInpaintClient::new(&config).unwrap()
}

/// Drive a workflow to the point of submission and return its request
fn marked_request(iterations: u8) -> (SubmissionRequest, Vec<u8>) {
    let bytes = encode_png(120, 80);
    let mut workflow = Workflow::default();
    workflow
        .load_image(ImagePayload::from_bytes(bytes.clone()).unwrap())
        .unwrap();
    workflow.begin_stroke(ImagePoint::new(30.0, 40.0)).unwrap();
    workflow.continue_stroke(ImagePoint::new(90.0, 40.0)).unwrap();
    workflow.end_stroke().unwrap();
    workflow.advance_to_configure().unwrap();
    workflow.set_iterations(iterations).unwrap();
    (workflow.begin_submission().unwrap(), bytes)
}

#[tokio::test]
async fn test_multipart_fields_and_response() -> Result<()> {
    let (addr, state) = spawn_server(Mode::Ok).await;
    let client = client_for(addr, 10);
    let (request, original) = marked_request(3);

    let output = client.submit(&request).await?;
    assert_eq!(output.job_id.as_str(), "job-abc");
    assert_eq!(output.result_image.bytes(), state.result_png.as_slice());
    assert_eq!(output.result_image.mime(), "image/png");

    let received = state.received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    let fields = &received[0];
    let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["image", "mask", "iterations"]);

    let image = &fields[0];
    assert_eq!(image.file_name.as_deref(), Some("image.png"));
    assert_eq!(image.content_type.as_deref(), Some("image/png"));
    assert_eq!(image.data, original);

    let mask = &fields[1];
    assert_eq!(mask.file_name.as_deref(), Some("mask.png"));
    assert_eq!(mask.content_type.as_deref(), Some("image/png"));
    let mask = MaskRaster::from_png_bytes(&mask.data)?.expect("mask has marked pixels");
    assert_eq!(mask.dimensions(), (120, 80));
    assert!(mask.is_marked(60, 40));
    assert!(!mask.is_marked(2, 2));

    assert_eq!(fields[2].data, b"3");
    Ok(())
}

#[tokio::test]
async fn test_missing_job_id_uses_timestamp() -> Result<()> {
    let (addr, _state) = spawn_server(Mode::OkWithoutJobId).await;
    let client = client_for(addr, 10);
    let (request, _) = marked_request(2);

    let output = client.submit(&request).await?;
    assert!(output.job_id.as_str().parse::<i64>().is_ok());
    Ok(())
}

#[tokio::test]
async fn test_server_error_is_submission_failure() {
    let (addr, _state) = spawn_server(Mode::ServerError).await;
    let client = client_for(addr, 10);
    let (request, _) = marked_request(2);

    let err = client.submit(&request).await.unwrap_err();
    assert!(matches!(err, InpaintError::Submission(_)));
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let (addr, _state) = spawn_server(Mode::Slow).await;
    let client = client_for(addr, 1);
    let (request, _) = marked_request(2);

    let err = client.submit(&request).await.unwrap_err();
    assert!(
        matches!(err, InpaintError::Timeout(d) if d == Duration::from_secs(1)),
        "{err}"
    );
}

#[tokio::test]
async fn test_unreachable_server_is_submission_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr, 5);
    let (request, _) = marked_request(2);
    let err = client.submit(&request).await.unwrap_err();
    assert!(err.is_submission_failure());
}

#[tokio::test]
async fn test_job_status_lookup() -> Result<()> {
    let (addr, _state) = spawn_server(Mode::Ok).await;
    let client = client_for(addr, 10);

    let status = client.job_status(&JobId::new("job-abc")).await?;
    assert_eq!(status.status.as_deref(), Some("completed"));
    assert_eq!(status.fields["job_id"], "job-abc");
    Ok(())
}

#[tokio::test]
async fn test_session_over_http_records_history() -> Result<()> {
    let (addr, _state) = spawn_server(Mode::Ok).await;
    let config = InpaintConfig::builder()
        .api_base_url(format!("http://{}/api/", addr))
        .build()?;
    let mut session = imgly_inpaint::connect(&config)?;

    let payload = ImagePayload::from_bytes(encode_png(64, 64))?;
    session.apply(|workflow| -> Result<()> {
        workflow.load_image(payload)?;
        workflow.begin_stroke(ImagePoint::new(32.0, 32.0))?;
        workflow.end_stroke()?;
        workflow.advance_to_configure()
    })?;
    session.submit_and_wait().await?;

    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().front().unwrap().id.as_str(), "job-abc");
    assert!(session.workflow().result().is_some());
    Ok(())
}
