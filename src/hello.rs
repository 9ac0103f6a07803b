//! Demonstration pipeline served by the `http-bridge` binary.
//!
//! - `GET /health` → `200 {"status":"healthy"}`
//! - `GET /` → `200 Hello World!`
//! - anything else → `404`

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::json;

use crate::pipeline::{HttpContext, Pipeline, PipelineError, Request, Response};

#[derive(Debug, Default)]
pub struct HelloPipeline;

impl Pipeline for HelloPipeline {
    type Context = HttpContext;

    fn create_context(&self, request: Request, response: Response) -> HttpContext {
        HttpContext::new(request, response)
    }

    fn process_request<'a>(&'a self, ctx: &'a mut HttpContext) -> BoxFuture<'a, Result<(), PipelineError>> {
        async move {
            let response = &ctx.response;
            let is_get = ctx.request.method() == axum::http::Method::GET;

            match (is_get, ctx.request.path()) {
                (true, "/health") => {
                    response.insert_header("Content-Type", "application/json")?;
                    let body = json!({ "status": "healthy" }).to_string();
                    response.write(body).await?;
                }
                (true, "/") => {
                    response.insert_header("Content-Type", "text/plain; charset=utf-8")?;
                    response.write("Hello World!").await?;
                }
                _ => {
                    response.set_status(404)?;
                    response.insert_header("Content-Type", "text/plain; charset=utf-8")?;
                    response.write("Not Found").await?;
                }
            }
            response.complete();
            Ok(())
        }
        .boxed()
    }
}
