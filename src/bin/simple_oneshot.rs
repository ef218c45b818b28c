// 该文件是 Shijian （食鉴） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像识别
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use url::Url;

use shijian::{
  FromUrl,
  input::ImageFileInput,
  model::{CocoLabel, YoloV8, YoloV8Builder},
  output::{SaveImageFileOutput, draw::Draw},
  task::{OneShotTask, PredictReport, Task},
};
use tracing::info;

/// Shijian 单张图像识别
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径，例如 yolov8:///models/yolov8n.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///tmp/fruit.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 标注结果，例如 image:///tmp/fruit-result.jpg
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 标签字体文件（TrueType）
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input_image = ImageFileInput::from_url(&args.input)?;
  let model: YoloV8<CocoLabel> = YoloV8Builder::from_url(&args.model)?.build()?;
  let mut output = SaveImageFileOutput::from_url(&args.output)?;
  if let Some(font) = &args.font {
    output = output.with_draw(Draw::default().with_font_file(font)?);
  }

  let result = OneShotTask.run_task(input_image, &model, &output)?;
  let report = PredictReport::from_result(output.path(), &result);

  println!("{}", serde_json::to_string_pretty(&report)?);

  Ok(())
}
