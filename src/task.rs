// 该文件是 Shijian （食鉴） 项目的一部分。
// src/task.rs - 推理任务
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

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
  input::ImageFileInputError,
  model::{DetectResult, Model, WithLabel},
  nutrition::{DetectedItems, NutritionItem},
  output::Render,
};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("没有输入帧")]
  NoInput,
  #[error("输入错误: {0}")]
  Input(#[from] ImageFileInputError),
  #[error("推理错误: {0}")]
  Model(BoxedError),
  #[error("渲染错误: {0}")]
  Render(BoxedError),
}

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: &M, output: &O) -> Result<Self::Output, Self::Error>;
}

/// 取一帧，推理并渲染，返回检测结果
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Output = D;
  type Error = TaskError;

  fn run_task(self, mut input: I, model: &M, output: &O) -> Result<Self::Output, Self::Error> {
    let frame = input.next().ok_or(TaskError::NoInput)?;
    let now = std::time::Instant::now();
    let result = model
      .infer(&frame)
      .map_err(|e| TaskError::Model(Box::new(e)))?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output
      .render_result(&frame, &result)
      .map_err(|e| TaskError::Render(Box::new(e)))?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(result)
  }
}

/// `/predict` 的响应体
#[derive(Debug, Serialize)]
pub struct PredictReport {
  pub result_image: String,
  pub items: Vec<NutritionItem>,
}

impl PredictReport {
  pub fn from_result<T: WithLabel>(result_image: &Path, result: &DetectResult<T>) -> Self {
    let detected = DetectedItems::tally(result);
    Self {
      result_image: result_image.to_string_lossy().replace('\\', "/"),
      items: detected.join_nutrition(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{CocoLabel, DetectItem};
  use std::cell::RefCell;

  struct FixedModel(Vec<u32>);

  impl Model for FixedModel {
    type Input = u8;
    type Output = DetectResult<CocoLabel>;
    type Error = std::io::Error;

    fn infer(&self, _input: &u8) -> Result<Self::Output, Self::Error> {
      Ok(DetectResult::from(
        self
          .0
          .iter()
          .map(|&id| DetectItem {
            kind: CocoLabel::from_label_id(id),
            score: 0.5,
            bbox: [0.0, 0.0, 1.0, 1.0],
          })
          .collect::<Vec<_>>(),
      ))
    }
  }

  struct FailingModel;

  impl Model for FailingModel {
    type Input = u8;
    type Output = DetectResult<CocoLabel>;
    type Error = std::io::Error;

    fn infer(&self, _input: &u8) -> Result<Self::Output, Self::Error> {
      Err(std::io::Error::other("boom"))
    }
  }

  #[derive(Default)]
  struct RecordingOutput(RefCell<Vec<(u8, usize)>>);

  impl Render<u8, DetectResult<CocoLabel>> for RecordingOutput {
    type Error = std::io::Error;

    fn render_result(&self, frame: &u8, result: &DetectResult<CocoLabel>) -> Result<(), Self::Error> {
      self.0.borrow_mut().push((*frame, result.len()));
      Ok(())
    }
  }

  #[test]
  fn one_shot_renders_first_frame_only() {
    let output = RecordingOutput::default();
    let result = OneShotTask
      .run_task(vec![7u8, 8u8].into_iter(), &FixedModel(vec![47, 47]), &output)
      .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(*output.0.borrow(), vec![(7, 2)]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let output = RecordingOutput::default();
    let err = OneShotTask
      .run_task(std::iter::empty::<u8>(), &FixedModel(vec![]), &output)
      .unwrap_err();
    assert!(matches!(err, TaskError::NoInput));
  }

  #[test]
  fn model_failure_skips_rendering() {
    let output = RecordingOutput::default();
    let err = OneShotTask
      .run_task(std::iter::once(1u8), &FailingModel, &output)
      .unwrap_err();
    assert!(matches!(err, TaskError::Model(_)));
    assert!(output.0.borrow().is_empty());
  }

  #[test]
  fn report_normalizes_separators() {
    let result = FixedModel(vec![47, 2, 47, 46]).infer(&0).unwrap();
    let report = PredictReport::from_result(Path::new("static\\output\\fruit.png"), &result);

    assert_eq!(report.result_image, "static/output/fruit.png");
    let items: Vec<_> = report.items.iter().map(|i| (i.name.as_str(), i.count)).collect();
    assert_eq!(items, vec![("apple", 2), ("banana", 1)]);
  }
}
