//! Record handlers

use crate::error::{ApiError, Result};
use crate::AppState;
use apod_types::{DeleteResponse, Record};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};

type IdParam = std::result::Result<Path<i64>, PathRejection>;
type RecordBody = std::result::Result<Json<Record>, JsonRejection>;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Record>>> {
    let records = state.db.list_records().await?;
    Ok(Json(records))
}

pub async fn get(State(state): State<AppState>, id: IdParam) -> Result<Json<Record>> {
    let Path(id) = id?;
    state
        .db
        .get_record(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

pub async fn create(
    State(state): State<AppState>,
    body: RecordBody,
) -> Result<(StatusCode, Json<Record>)> {
    let Json(record) = body?;
    let stored = state.db.create_record(&record).await?;
    tracing::info!("Created record {:?}", stored.id);
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update(
    State(state): State<AppState>,
    id: IdParam,
    body: RecordBody,
) -> Result<Json<Record>> {
    let Path(id) = id?;
    let Json(record) = body?;

    if !state.db.update_record(id, &record).await? {
        return Err(ApiError::NotFound(id));
    }

    tracing::info!("Updated record {}", id);
    Ok(Json(record.with_id(id)))
}

pub async fn delete(State(state): State<AppState>, id: IdParam) -> Result<Json<DeleteResponse>> {
    let Path(id) = id?;

    if !state.db.delete_record(id).await? {
        return Err(ApiError::NotFound(id));
    }

    tracing::info!("Deleted record {}", id);
    Ok(Json(DeleteResponse::new(id)))
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;
    use crate::{router, AppState};
    use apod_types::{DeleteResponse, ErrorResponse, Record};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let db = Database::in_memory().await.unwrap();
        router(AppState { db: Arc::new(db) })
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        send_raw(app, method, uri, body.map(|value| value.to_string())).await
    }

    /// Send `body` verbatim, labelled as JSON, and check the response is too
    async fn send_raw(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<String>,
    ) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(text) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(text)
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_list_empty_store() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/records", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Value>(&body), json!([]));
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let app = app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/records",
            Some(json!({"explanation": "e1", "title": "t1", "url": "u1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            parse::<Value>(&body),
            json!({"id": 1, "explanation": "e1", "title": "t1", "url": "u1"})
        );

        let (status, fetched) = send(&app, Method::GET, "/records/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Value>(&fetched), parse::<Value>(&body));

        let (status, body) = send(&app, Method::DELETE, "/records/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<DeleteResponse>(&body), DeleteResponse::new(1));

        let (status, _) = send(&app, Method::GET, "/records/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_keeps_date() {
        let app = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/records",
            Some(json!({
                "date": "2024-03-14",
                "explanation": "e",
                "title": "t",
                "url": "u",
                "media_type": "image"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let stored: Record = parse(&body);
        assert_eq!(stored.date.unwrap().to_string(), "2024-03-14");

        let (_, body) = send(&app, Method::GET, "/records", None).await;
        assert_eq!(parse::<Vec<Record>>(&body), vec![stored]);
    }

    #[tokio::test]
    async fn test_get_missing_has_no_record() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/records/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());

        let (status, body) = send(&app, Method::DELETE, "/records/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let app = app().await;
        send(
            &app,
            Method::POST,
            "/records",
            Some(json!({"explanation": "e", "title": "t", "url": "u"})),
        )
        .await;

        let (status, _) = send(&app, Method::DELETE, "/records/1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::DELETE, "/records/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::DELETE, "/records/7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_replaces_explanation_and_title() {
        let app = app().await;
        for n in 1..=2 {
            send(
                &app,
                Method::POST,
                "/records",
                Some(json!({"explanation": format!("e{n}"), "title": format!("t{n}"), "url": format!("u{n}")})),
            )
            .await;
        }

        let (status, body) = send(
            &app,
            Method::PUT,
            "/records/1",
            Some(json!({"explanation": "e1b", "title": "t1b", "url": "u1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Record>(&body), Record::new("e1b", "t1b", "u1").with_id(1));

        let (_, body) = send(&app, Method::GET, "/records", None).await;
        assert_eq!(
            parse::<Vec<Record>>(&body),
            vec![
                Record::new("e1b", "t1b", "u1").with_id(1),
                Record::new("e2", "t2", "u2").with_id(2),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let app = app().await;
        let (status, _) = send(
            &app,
            Method::PUT,
            "/records/5",
            Some(json!({"explanation": "e", "title": "t", "url": "u"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_input_is_client_error() {
        let app = app().await;

        // Missing required field
        let (status, body) = send(
            &app,
            Method::POST,
            "/records",
            Some(json!({"explanation": "e", "title": "t"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(serde_json::from_slice::<ErrorResponse>(&body).is_ok());

        // Malformed JSON
        let (status, body) = send_raw(
            &app,
            Method::POST,
            "/records",
            Some("{not json".to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(serde_json::from_slice::<ErrorResponse>(&body).is_ok());

        // Non-numeric id
        let (status, _) = send(&app, Method::GET, "/records/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // The server keeps serving afterwards
        let (status, _) = send(&app, Method::GET, "/records", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_update_leaves_row_unchanged() {
        let app = app().await;
        send(
            &app,
            Method::POST,
            "/records",
            Some(json!({"explanation": "e1", "title": "t1", "url": "u1"})),
        )
        .await;

        // Every writable field is required
        let (status, body) = send(
            &app,
            Method::PUT,
            "/records/1",
            Some(json!({"explanation": "e", "title": "t"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(serde_json::from_slice::<ErrorResponse>(&body).is_ok());

        let (status, _) = send_raw(
            &app,
            Method::PUT,
            "/records/1",
            Some("{\"explanation\": ".to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::PUT,
            "/records/abc",
            Some(json!({"explanation": "e", "title": "t", "url": "u"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::DELETE, "/records/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, Method::GET, "/records/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Record>(&body), Record::new("e1", "t1", "u1").with_id(1));
    }

    #[tokio::test]
    async fn test_health_and_fallback() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Value>(&body)["status"], "ok");

        let (status, _) = send(&app, Method::GET, "/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
