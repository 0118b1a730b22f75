use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    cards::{
        dto::{Card, CardsPage, CreateCardRequest, ListCardsQuery, UpdateCardRequest},
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn card_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/card",
            get(list_cards).post(create_card).put(update_card),
        )
        .route("/card/:activities_no", get(get_card).delete(delete_card))
}

#[instrument(skip(state))]
pub async fn list_cards(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    query: Result<Query<ListCardsQuery>, QueryRejection>,
) -> Result<Json<CardsPage>, AppError> {
    let Query(query) = query?;
    let param = query.into_param()?;
    let page = services::get_all_cards(&state.db, param).await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
pub async fn get_card(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    activities_no: Result<Path<String>, PathRejection>,
) -> Result<Json<Card>, AppError> {
    let Path(activities_no) = activities_no?;
    let card = services::get_card(&state.db, user_id, &activities_no).await?;
    Ok(Json(card))
}

#[instrument(skip(state, payload))]
pub async fn create_card(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateCardRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Card>), AppError> {
    let Json(payload) = payload?;
    let card = services::create_card(&state.db, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

#[instrument(skip(state, payload))]
pub async fn update_card(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<UpdateCardRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(payload) = payload?;
    services::update_card(&state.db, user_id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_card(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    activities_no: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(activities_no) = activities_no?;
    services::delete_card(&state.db, user_id, &activities_no).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{header::AUTHORIZATION, Request},
    };
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        card_routes().with_state(state)
    }

    fn bearer(state: &AppState, user_id: i64) -> String {
        let token = JwtKeys::from_ref(state).sign_access(user_id).unwrap();
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn every_card_route_requires_a_token() {
        let state = AppState::fake();
        for (method, uri) in [
            ("GET", "/card"),
            ("GET", "/card/AC-0001"),
            ("POST", "/card"),
            ("PUT", "/card"),
            ("DELETE", "/card/AC-0001"),
        ] {
            let response = app(state.clone())
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn list_reports_bad_query_parameters() {
        let state = AppState::fake();
        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/card?author_id=x&page=y&size=5")
                    .header(AUTHORIZATION, bearer(&state, 1))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let msg = body["error"].as_str().unwrap();
        assert!(msg.contains("author_id"));
        assert!(msg.contains("page"));
    }

    #[tokio::test]
    async fn undecodable_query_is_a_json_bad_request() {
        let state = AppState::fake();
        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/card?page=1&page=2")
                    .header(AUTHORIZATION, bearer(&state, 1))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("page"));
    }

    #[tokio::test]
    async fn undecodable_path_is_a_json_bad_request() {
        let state = AppState::fake();
        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/card/%FF%FE")
                    .header(AUTHORIZATION, bearer(&state, 1))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn create_rejects_bad_marked_date() {
        let state = AppState::fake();
        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/card")
                    .header(AUTHORIZATION, bearer(&state, 1))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"title": "Pay rent", "content": "", "marked": "2024/01/01"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn update_rejects_non_json_body() {
        let state = AppState::fake();
        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/card")
                    .header(AUTHORIZATION, bearer(&state, 1))
                    .body(Body::from("activities_no=AC-0001"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
