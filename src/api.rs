// 该文件是 Shijian （食鉴） 项目的一部分。
// src/api.rs - HTTP 接口
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::DefaultBodyLimit,
  response::Html,
  routing::{get, post},
};
use image::RgbImage;
use serde_json::{Value, json};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
  model::{CocoLabel, DetectResult, Model},
  output::draw::Draw,
};

mod error;
mod predict;

pub use self::error::PredictError;
pub use self::predict::IMAGE_FIELD;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// 服务目录配置
#[derive(Debug, Clone)]
pub struct ApiConfig {
  /// 静态文件根目录，挂载在 `/static`
  pub static_dir: PathBuf,
  /// 上传文件临时目录
  pub input_dir: PathBuf,
  /// 标注结果目录
  pub output_dir: PathBuf,
  /// 上传大小上限，`None` 表示不限制
  pub max_upload_bytes: Option<usize>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      static_dir: PathBuf::from("static"),
      input_dir: PathBuf::from("static/input"),
      output_dir: PathBuf::from("static/output"),
      max_upload_bytes: None,
    }
  }
}

pub struct AppState<M> {
  pub model: Arc<M>,
  pub draw: Draw,
  pub config: Arc<ApiConfig>,
}

impl<M> Clone for AppState<M> {
  fn clone(&self) -> Self {
    Self {
      model: Arc::clone(&self.model),
      draw: self.draw.clone(),
      config: Arc::clone(&self.config),
    }
  }
}

impl<M> AppState<M> {
  pub fn new(model: M, draw: Draw, config: ApiConfig) -> Self {
    Self {
      model: Arc::new(model),
      draw,
      config: Arc::new(config),
    }
  }
}

pub fn create_router<M>(state: AppState<M>) -> Router
where
  M: Model<Input = RgbImage, Output = DetectResult<CocoLabel>> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let body_limit = match state.config.max_upload_bytes {
    Some(limit) => DefaultBodyLimit::max(limit),
    None => DefaultBodyLimit::disable(),
  };
  let static_files = ServeDir::new(&state.config.static_dir);

  Router::new()
    .route("/", get(index))
    .route("/health", get(health))
    .route("/predict", post(predict::predict::<M>))
    .nest_service("/static", static_files)
    .layer(body_limit)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn index() -> Html<&'static str> {
  Html(INDEX_HTML)
}

async fn health() -> Json<Value> {
  Json(json!({ "status": "ok" }))
}
