// 该文件是 Shijian （食鉴） 项目的一部分。
// src/api/predict.rs - 识别接口
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
  body::Bytes,
  extract::{Multipart, State, multipart::MultipartRejection},
};
use image::RgbImage;
use tracing::{debug, info};

use super::{AppState, PredictError};
use crate::{
  input::{ImageFileInput, ScratchFile, secure_filename},
  model::{CocoLabel, DetectResult, Model},
  output::SaveImageFileOutput,
  task::{OneShotTask, PredictReport, Task, TaskError},
};

/// 上传图像所用的表单字段
pub const IMAGE_FIELD: &str = "image";

struct UploadedImage {
  file_name: String,
  data: Bytes,
}

/// 取第一个名为 `image` 且带文件名的表单项
async fn receive_upload(multipart: &mut Multipart) -> Result<UploadedImage, PredictError> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(IMAGE_FIELD) {
      continue;
    }
    // 没有 filename 参数的是普通表单字段
    let Some(file_name) = field.file_name().map(str::to_owned) else {
      continue;
    };
    if file_name.is_empty() {
      return Err(PredictError::NoFileSelected);
    }

    let data = field.bytes().await?;
    return Ok(UploadedImage { file_name, data });
  }

  Err(PredictError::NoFileUploaded)
}

pub async fn predict<M>(
  State(state): State<AppState<M>>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictReport>, PredictError>
where
  M: Model<Input = RgbImage, Output = DetectResult<CocoLabel>> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let mut multipart = multipart.map_err(|e| {
    debug!("请求体不是 multipart: {}", e);
    PredictError::NoFileUploaded
  })?;

  let upload = receive_upload(&mut multipart).await?;
  let file_name = secure_filename(&upload.file_name);
  if file_name.is_empty() {
    return Err(PredictError::InvalidFileName);
  }
  info!("收到上传图像: {} ({} 字节)", file_name, upload.data.len());

  let scratch = ScratchFile::write(&state.config.input_dir, &file_name, &upload.data).await?;
  let output = SaveImageFileOutput::new(state.config.output_dir.join(&file_name), state.draw.clone());

  let model = state.model.clone();
  let input_path = scratch.path().to_path_buf();
  let (result, output) = tokio::task::spawn_blocking(move || {
    let input = ImageFileInput::open(&input_path).map_err(TaskError::from)?;
    let result = OneShotTask.run_task(input, model.as_ref(), &output)?;
    Ok::<_, PredictError>((result, output))
  })
  .await??;

  let report = PredictReport::from_result(output.path(), &result);
  scratch.remove().await?;

  info!(
    "识别完成: {} 个物体, {} 种有营养信息",
    result.len(),
    report.items.len()
  );

  Ok(Json(report))
}
