// 该文件是 Shijian （食鉴） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shijian::{
  FromUrl,
  api::{AppState, create_router},
  model::{CocoLabel, YoloV8, YoloV8Builder},
  output::draw::Draw,
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("Shijian 食物识别服务");
  info!("模型路径: {}", args.model);
  info!("上传目录: {}", args.input_dir.display());
  info!("输出目录: {}", args.output_dir.display());

  // 模型只在启动时加载一次，所有请求共享
  let mut builder = YoloV8Builder::from_url(&args.model)?;
  if let Some(confidence) = args.confidence {
    builder = builder.confidence(confidence);
  }
  if let Some(nms_threshold) = args.nms_threshold {
    builder = builder.nms_threshold(nms_threshold);
  }
  let model: YoloV8<CocoLabel> = builder.build()?;

  let draw = match &args.font {
    Some(font) => Draw::default().with_font_file(font)?,
    None => {
      info!("未指定标签字体，只绘制边框");
      Draw::default()
    }
  };

  let state = AppState::new(model, draw, args.api_config());
  let app = create_router(state);

  let listener = tokio::net::TcpListener::bind(args.bind)
    .await
    .with_context(|| format!("无法监听地址: {}", args.bind))?;
  info!("服务已启动: http://{}", args.bind);
  axum::serve(listener, app).await?;

  Ok(())
}
