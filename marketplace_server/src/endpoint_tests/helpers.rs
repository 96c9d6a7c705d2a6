use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use log::debug;

use crate::routes::CALLBACK_TOKEN_HEADER;

pub const TEST_TOKEN: &str = "test-callback-token";

pub async fn post_json<F>(token: Option<&str>, path: &str, body: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let mut req = TestRequest::post().uri(path).insert_header(ContentType::json()).set_payload(body.to_string());
    if let Some(token) = token {
        req = req.insert_header((CALLBACK_TOKEN_HEADER, token));
    }
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::call_service(&service, req.to_request()).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
