// 该文件是 Shijian （食鉴） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use url::Url;

use shijian::api::ApiConfig;

/// Shijian 服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径，例如 yolov8:///models/yolov8n.onnx
  #[arg(long, env = "SHIJIAN_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// 监听地址
  #[arg(long, env = "SHIJIAN_BIND", default_value = "127.0.0.1:5000", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 静态文件根目录，挂载在 /static
  #[arg(long, env = "SHIJIAN_STATIC_DIR", default_value = "static", value_name = "DIR")]
  pub static_dir: PathBuf,

  /// 上传文件临时目录
  #[arg(long, env = "SHIJIAN_INPUT_DIR", default_value = "static/input", value_name = "DIR")]
  pub input_dir: PathBuf,

  /// 标注结果目录
  #[arg(long, env = "SHIJIAN_OUTPUT_DIR", default_value = "static/output", value_name = "DIR")]
  pub output_dir: PathBuf,

  /// 标签字体文件（TrueType），不指定时只绘制边框
  #[arg(long, env = "SHIJIAN_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)，覆盖模型路径中的设置，默认 0.25
  #[arg(long, env = "SHIJIAN_CONFIDENCE", value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// NMS IOU 阈值 (0.0 - 1.0)，覆盖模型路径中的设置，默认 0.7
  #[arg(long, env = "SHIJIAN_NMS_THRESHOLD", value_name = "THRESHOLD")]
  pub nms_threshold: Option<f32>,

  /// 上传大小上限（字节），不指定时不限制
  #[arg(long, env = "SHIJIAN_MAX_UPLOAD_BYTES", value_name = "BYTES")]
  pub max_upload_bytes: Option<usize>,
}

impl Args {
  pub fn api_config(&self) -> ApiConfig {
    ApiConfig {
      static_dir: self.static_dir.clone(),
      input_dir: self.input_dir.clone(),
      output_dir: self.output_dir.clone(),
      max_upload_bytes: self.max_upload_bytes,
    }
  }
}
