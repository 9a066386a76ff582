use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

use crate::middlewares::current_user;
use crate::models::*;
use crate::services::EventService;

#[utoipa::path(
    get,
    path = "/event/info",
    tag = "event",
    responses(
        (status = 200, description = "活动时间与消费门槛", body = EventInfoResponse)
    )
)]
pub async fn get_info(service: web::Data<EventService>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(ApiResponse::success(service.event_info())))
}

#[utoipa::path(
    get,
    path = "/event/prizes",
    tag = "event",
    responses(
        (status = 200, description = "转盘奖品列表", body = [PrizeResponse])
    )
)]
/// 转盘扇区按返回顺序排列
pub async fn get_prizes(service: web::Data<EventService>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(ApiResponse::success(service.list_prizes())))
}

#[utoipa::path(
    get,
    path = "/event/check-eligibility",
    tag = "event",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "抽奖资格", body = EligibilitySummary),
        (status = 401, description = "未授权")
    )
)]
/// 查询抽奖资格（只读）。不可参与时 `eligible=false` 并给出 `reason`
pub async fn check_eligibility(
    service: web::Data<EventService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let username = match current_user(&req) {
        Ok(username) => username,
        Err(e) => return Ok(e.error_response()),
    };
    match service.check_eligibility(&username).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(ApiResponse::success(summary))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/event/spin-wheel",
    tag = "event",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "抽奖成功", body = SpinResponse),
        (status = 400, description = "不可参与（no_bookings / event_ended / quota_exhausted）"),
        (status = 401, description = "未授权"),
        (status = 503, description = "存储暂不可用，可重试")
    )
)]
/// 转动转盘:
/// 1. 检查订房记录、活动时间与剩余次数
/// 2. 按权重抽取奖品
/// 3. 写入抽奖记录（中奖时同时写入中奖记录）
/// 4. 返回奖品、动画角度与最新资格
pub async fn spin_wheel(service: web::Data<EventService>, req: HttpRequest) -> Result<HttpResponse> {
    let username = match current_user(&req) {
        Ok(username) => username,
        Err(e) => return Ok(e.error_response()),
    };
    match service.spin(&username).await {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiResponse::success(result))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/event/records",
    tag = "event",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取中奖记录成功"),
        (status = 401, description = "未授权")
    )
)]
/// 分页获取当前用户的中奖记录（倒序）
pub async fn get_records(
    service: web::Data<EventService>,
    req: HttpRequest,
    query: web::Query<WinRecordQuery>,
) -> Result<HttpResponse> {
    let username = match current_user(&req) {
        Ok(username) => username,
        Err(e) => return Ok(e.error_response()),
    };
    match service.list_wins(&username, &query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn event_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/event")
            .route("/info", web::get().to(get_info))
            .route("/prizes", web::get().to(get_prizes))
            .route("/check-eligibility", web::get().to(check_eligibility))
            .route("/spin-wheel", web::post().to(spin_wheel))
            .route("/records", web::get().to(get_records)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventConfig;
    use crate::handlers::api_config;
    use crate::middlewares::AuthMiddleware;
    use crate::services::AuthService;
    use crate::storage::{MemoryEventStore, MemoryUserStore};
    use crate::utils::{FixedClock, JwtService, format_timestamp};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn services() -> (web::Data<EventService>, web::Data<AuthService>, JwtService) {
        let store = MemoryEventStore::with_bookings(vec![BookingRow {
            username: "alice".into(),
            price: Some("600000".into()),
            status: Some("completed".into()),
            booking_time: Some(format_timestamp(
                &NaiveDate::from_ymd_opt(2026, 9, 1)
                    .unwrap()
                    .and_hms_opt(14, 0, 0)
                    .unwrap(),
            )),
        }]);
        let clock = Arc::new(FixedClock(now()));
        let jwt = JwtService::new("handler-test", 3600, 7200);
        // 最大奖品 50k：600k + 50k 仍只有一次机会
        let config = EventConfig {
            prizes: vec![
                PrizeDefinition::new("Better luck next time", 0.0, 1),
                PrizeDefinition::new("50,000 VND", 50_000.0, 1),
            ],
            ..EventConfig::default()
        };
        let event = EventService::new(Arc::new(store), config, clock.clone()).unwrap();
        let auth = AuthService::new(Arc::new(MemoryUserStore::new()), jwt.clone(), clock)
            .with_hash_cost(4);
        (web::Data::new(event), web::Data::new(auth), jwt)
    }

    macro_rules! init_app {
        () => {{
            let (event, auth, jwt) = services();
            test::init_service(
                App::new()
                    .wrap(AuthMiddleware::new(jwt))
                    .app_data(event)
                    .app_data(auth)
                    .configure(api_config),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn test_public_event_routes() {
        let app = init_app!();

        let req = test::TestRequest::get().uri("/api/v1/event/prizes").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][1]["probability_percent"], 50.0);

        let req = test::TestRequest::get().uri("/api/v1/event/info").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["is_running"], true);
        assert_eq!(body["data"]["start_month"], 8);
    }

    #[actix_web::test]
    async fn test_spin_requires_authentication() {
        let app = init_app!();
        let req = test::TestRequest::post()
            .uri("/api/v1/event/spin-wheel")
            .to_request();
        let err = test::try_call_service(&app, req).await.err().unwrap();
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn test_register_check_and_spin_flow() {
        let app = init_app!();

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({ "username": "alice", "password": "password123" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let token = body["data"]["access_token"].as_str().unwrap().to_string();
        let bearer = ("Authorization", format!("Bearer {token}"));

        let req = test::TestRequest::get()
            .uri("/api/v1/event/check-eligibility")
            .insert_header(bearer.clone())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["eligible"], true);
        assert_eq!(body["data"]["max_spins"], 1);

        let req = test::TestRequest::post()
            .uri("/api/v1/event/spin-wheel")
            .insert_header(bearer.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["eligibility"]["used_spins"], 1);
        assert_eq!(body["data"]["eligibility"]["spins_remaining"], 0);
        assert!(body["data"]["final_angle"].as_f64().unwrap() <= 360.0);

        let req = test::TestRequest::post()
            .uri("/api/v1/event/spin-wheel")
            .insert_header(bearer)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "NOT_ELIGIBLE");
        assert_eq!(body["error"]["reason"], "quota_exhausted");
    }

    #[actix_web::test]
    async fn test_user_without_bookings_gets_reason() {
        let app = init_app!();

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({ "username": "bob", "password": "password123" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let token = body["data"]["access_token"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri("/api/v1/event/check-eligibility")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["eligible"], false);
        assert_eq!(body["data"]["has_bookings"], false);
        assert_eq!(body["data"]["reason"], "no_bookings");

        let req = test::TestRequest::get()
            .uri("/api/v1/event/records")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["pagination"]["total"], 0);
    }
}
