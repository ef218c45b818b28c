// 该文件是 Shijian （食鉴） 项目的一部分。
// src/api/error.rs - 接口错误
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

use axum::{
  Json,
  extract::multipart::MultipartError,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use crate::task::TaskError;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum PredictError {
  #[error("No file uploaded")]
  NoFileUploaded,
  #[error("No file selected")]
  NoFileSelected,
  #[error("Invalid file name")]
  InvalidFileName,
  #[error("multipart 解析错误: {0}")]
  Multipart(#[from] MultipartError),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("处理任务失败: {0}")]
  Task(#[from] TaskError),
  #[error("处理线程异常: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl PredictError {
  pub fn status(&self) -> StatusCode {
    match self {
      PredictError::NoFileUploaded | PredictError::NoFileSelected | PredictError::InvalidFileName => {
        StatusCode::BAD_REQUEST
      }
      PredictError::Multipart(e) => e.status(),
      PredictError::Io(_) | PredictError::Task(_) | PredictError::Join(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for PredictError {
  fn into_response(self) -> Response {
    let status = self.status();

    let message = if status.is_server_error() {
      error!(status = status.as_u16(), "处理请求失败: {}", self);
      INTERNAL_ERROR_MESSAGE.to_string()
    } else {
      debug!(status = status.as_u16(), "请求无效: {}", self);
      match &self {
        PredictError::Multipart(e) => e.body_text(),
        _ => self.to_string(),
      }
    };

    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validation_errors_are_bad_request() {
    for err in [
      PredictError::NoFileUploaded,
      PredictError::NoFileSelected,
      PredictError::InvalidFileName,
    ] {
      assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
  }

  #[test]
  fn processing_errors_are_opaque() {
    let err = PredictError::Task(TaskError::NoInput);
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = PredictError::Io(std::io::Error::other("disk full")).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
