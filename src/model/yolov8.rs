// 该文件是 Shijian （食鉴） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 模型
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

use std::{marker::PhantomData, path::PathBuf, sync::Mutex};

use image::RgbImage;
use ndarray::{Array2, ArrayViewD, Axis, Ix2};
use ort::{
  execution_providers::CPUExecutionProvider,
  session::{Session, builder::GraphOptimizationLevel},
  value::Value,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::LetterboxFrame,
  model::{DetectItem, DetectResult, Model, WithLabel},
};

const YOLOV8_INPUT_SIZE: u32 = 640;
const YOLOV8_BOX_DIMS: usize = 4;
const YOLOV8_CONFIDENCE: f32 = 0.25;
const YOLOV8_NMS_THRESHOLD: f32 = 0.7;
const YOLOV8_MAX_DETECTIONS: usize = 300;

#[derive(Error, Debug)]
pub enum YoloV8Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型参数错误: {0}")]
  ParameterError(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("推理会话不可用")]
  SessionPoisoned,
}

fn ort_error<E: std::fmt::Display>(e: E) -> YoloV8Error {
  YoloV8Error::OrtError(e.to_string())
}

pub struct YoloV8<T> {
  session: Mutex<Session>,
  input_name: String,
  confidence: f32,
  nms_threshold: f32,
  max_detections: usize,
  _phantom: PhantomData<fn() -> T>,
}

pub struct YoloV8Builder {
  model_path: PathBuf,
  confidence: f32,
  nms_threshold: f32,
  max_detections: usize,
}

impl FromUrlWithScheme for YoloV8Builder {
  const SCHEME: &'static str = "yolov8";
}

impl FromUrl for YoloV8Builder {
  type Error = YoloV8Error;

  /// `yolov8:///path/to/model.onnx?confidence=0.3&nms=0.5&max_det=100`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloV8Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = YoloV8Builder {
      model_path: PathBuf::from(url.path()),
      confidence: YOLOV8_CONFIDENCE,
      nms_threshold: YOLOV8_NMS_THRESHOLD,
      max_detections: YOLOV8_MAX_DETECTIONS,
    };

    for (k, v) in url.query_pairs() {
      let invalid = |_| YoloV8Error::ParameterError(format!("{} = {}", k, v));
      match k.as_ref() {
        "confidence" => builder.confidence = v.parse().map_err(invalid)?,
        "nms" => builder.nms_threshold = v.parse().map_err(invalid)?,
        "max_det" => {
          builder.max_detections = v
            .parse()
            .map_err(|_| YoloV8Error::ParameterError(format!("{} = {}", k, v)))?
        }
        _ => debug!("忽略未知模型参数: {}", k),
      }
    }

    Ok(builder)
  }
}

impl YoloV8Builder {
  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence.clamp(0.0, 1.0);
    self
  }

  pub fn nms_threshold(mut self, nms_threshold: f32) -> Self {
    self.nms_threshold = nms_threshold.clamp(0.0, 1.0);
    self
  }

  pub fn build<T>(self) -> Result<YoloV8<T>, YoloV8Error> {
    info!("加载模型文件: {}", self.model_path.display());
    if !self.model_path.is_file() {
      return Err(YoloV8Error::ModelPathError(format!(
        "模型文件不存在: {}",
        self.model_path.display()
      )));
    }

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()
      .map_err(ort_error)?
      .with_execution_providers([CPUExecutionProvider::default().build()])
      .map_err(ort_error)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(ort_error)?
      .commit_from_file(&self.model_path)
      .map_err(ort_error)?;

    if session.inputs.len() != 1 {
      return Err(YoloV8Error::ModelInvalid(format!(
        "预期模型输入数量为 1, 实际为 {}",
        session.inputs.len()
      )));
    }
    if session.outputs.is_empty() {
      return Err(YoloV8Error::ModelInvalid("模型没有输出".to_string()));
    }

    let input_name = session.inputs[0].name.clone();
    debug!("模型输入: {}", input_name);
    debug!("模型输出数量: {}", session.outputs.len());
    info!(
      "模型加载完成，置信度阈值 {}, NMS 阈值 {}",
      self.confidence, self.nms_threshold
    );

    Ok(YoloV8 {
      session: Mutex::new(session),
      input_name,
      confidence: self.confidence,
      nms_threshold: self.nms_threshold,
      max_detections: self.max_detections,
      _phantom: PhantomData,
    })
  }
}

/// 模型输入空间中的候选框
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
  class_id: u32,
  score: f32,
  bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，像素坐标
}

/// 将输出张量整理为每行一个锚点：[N, 4 + C]
fn prediction_rows(output: ArrayViewD<'_, f32>) -> Result<Array2<f32>, YoloV8Error> {
  let shape = output.shape().to_vec();
  if shape.len() != 3 || shape[0] != 1 {
    return Err(YoloV8Error::ModelInvalid(format!(
      "意外的输出形状: {:?}",
      shape
    )));
  }

  let batch = output
    .index_axis(Axis(0), 0)
    .into_dimensionality::<Ix2>()
    .map_err(|e| YoloV8Error::ModelInvalid(e.to_string()))?;

  // 官方导出为 [1, 4 + C, N]，锚点数远大于属性数
  let rows = if shape[1] < shape[2] {
    batch.t().to_owned()
  } else {
    batch.to_owned()
  };

  if rows.ncols() <= YOLOV8_BOX_DIMS {
    return Err(YoloV8Error::ModelInvalid(format!(
      "输出属性数量不足: {}",
      rows.ncols()
    )));
  }

  Ok(rows)
}

fn decode_candidates(rows: &Array2<f32>, confidence: f32) -> Vec<Candidate> {
  let mut candidates = Vec::new();

  for row in rows.rows() {
    let (class_id, score) = row
      .iter()
      .skip(YOLOV8_BOX_DIMS)
      .enumerate()
      .fold((0usize, f32::MIN), |best, (c, &s)| {
        if s > best.1 { (c, s) } else { best }
      });

    if score <= confidence {
      continue;
    }

    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    candidates.push(Candidate {
      class_id: class_id as u32,
      score,
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }

  candidates
}

/// 按类别进行非极大值抑制
fn nms(mut candidates: Vec<Candidate>, threshold: f32, max_detections: usize) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut result: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    if result.len() >= max_detections {
      break;
    }
    let suppressed = result
      .iter()
      .any(|kept| kept.class_id == candidate.class_id && iou(&kept.bbox, &candidate.bbox) > threshold);
    if !suppressed {
      result.push(candidate);
    }
  }

  result
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

impl<T> YoloV8<T> {
  fn run_session(&self, frame: &LetterboxFrame) -> Result<Array2<f32>, YoloV8Error> {
    let tensor = Value::from_array(frame.as_nchw().to_owned()).map_err(ort_error)?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| YoloV8Error::SessionPoisoned)?;
    let outputs = session
      .run(ort::inputs![self.input_name.as_str() => tensor])
      .map_err(ort_error)?;
    let output = outputs[0].try_extract_array::<f32>().map_err(ort_error)?;
    debug!("模型输出形状: {:?}", output.shape());

    prediction_rows(output.view())
  }
}

impl<T: WithLabel> Model for YoloV8<T> {
  type Input = RgbImage;
  type Output = DetectResult<T>;
  type Error = YoloV8Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理输入图像: {}x{}", input.width(), input.height());
    let frame = LetterboxFrame::from_rgb_image(input, YOLOV8_INPUT_SIZE);

    let now = std::time::Instant::now();
    let rows = self.run_session(&frame)?;
    debug!("模型推理完成，耗时: {:.2?}", now.elapsed());

    let candidates = decode_candidates(&rows, self.confidence);
    let kept = nms(candidates, self.nms_threshold, self.max_detections);
    debug!("检测到 {} 个物体", kept.len());

    let items: Vec<DetectItem<T>> = kept
      .into_iter()
      .map(|c| DetectItem {
        kind: T::from_label_id(c.class_id),
        score: c.score,
        bbox: frame.restore_bbox(c.bbox),
      })
      .collect();

    Ok(DetectResult::from(items))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::{Array3, array};

  fn candidate(class_id: u32, score: f32, bbox: [f32; 4]) -> Candidate {
    Candidate {
      class_id,
      score,
      bbox,
    }
  }

  #[test]
  fn decode_keeps_best_class_above_threshold() {
    // cx, cy, w, h, 三个类别分数
    let rows = array![
      [50.0, 50.0, 20.0, 10.0, 0.1, 0.9, 0.2],
      [10.0, 10.0, 4.0, 4.0, 0.2, 0.1, 0.24],
    ];

    let candidates = decode_candidates(&rows, 0.25);
    assert_eq!(candidates, vec![candidate(1, 0.9, [40.0, 45.0, 60.0, 55.0])]);
  }

  #[test]
  fn nms_suppresses_overlap_within_class_only() {
    let candidates = vec![
      candidate(0, 0.8, [0.0, 0.0, 10.0, 10.0]),
      candidate(0, 0.9, [1.0, 1.0, 11.0, 11.0]),
      candidate(1, 0.7, [0.0, 0.0, 10.0, 10.0]),
      candidate(0, 0.6, [50.0, 50.0, 60.0, 60.0]),
    ];

    let kept = nms(candidates, 0.5, 300);
    let scores: Vec<f32> = kept.iter().map(|c| c.score).collect();
    assert_eq!(scores, vec![0.9, 0.7, 0.6]);
  }

  #[test]
  fn nms_respects_max_detections() {
    let candidates = (0..10)
      .map(|i| candidate(0, i as f32 / 10.0, [i as f32 * 20.0, 0.0, i as f32 * 20.0 + 10.0, 10.0]))
      .collect();

    assert_eq!(nms(candidates, 0.5, 3).len(), 3);
  }

  #[test]
  fn iou_of_disjoint_and_identical_boxes() {
    let a = [0.0, 0.0, 10.0, 10.0];
    assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn prediction_rows_accepts_both_layouts() {
    // [1, 5, 8]: 属性在前
    let channels_first = Array3::<f32>::zeros((1, 5, 8)).into_dyn();
    assert_eq!(prediction_rows(channels_first.view()).unwrap().dim(), (8, 5));

    // [1, 8, 5]: 锚点在前
    let anchors_first = Array3::<f32>::zeros((1, 8, 5)).into_dyn();
    assert_eq!(prediction_rows(anchors_first.view()).unwrap().dim(), (8, 5));
  }

  #[test]
  fn prediction_rows_rejects_bad_shape() {
    let bad = Array3::<f32>::zeros((2, 5, 8)).into_dyn();
    assert!(prediction_rows(bad.view()).is_err());

    let no_classes = Array3::<f32>::zeros((1, 4, 8)).into_dyn();
    assert!(prediction_rows(no_classes.view()).is_err());
  }

  #[test]
  fn builder_from_url_reads_query() {
    let url = Url::parse("yolov8:///models/yolov8n.onnx?confidence=0.4&nms=0.5&max_det=10").unwrap();
    let builder = YoloV8Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, PathBuf::from("/models/yolov8n.onnx"));
    assert_eq!(builder.confidence, 0.4);
    assert_eq!(builder.nms_threshold, 0.5);
    assert_eq!(builder.max_detections, 10);
  }

  #[test]
  fn builder_rejects_other_scheme() {
    let url = Url::parse("file:///models/yolov8n.onnx").unwrap();
    assert!(matches!(
      YoloV8Builder::from_url(&url),
      Err(YoloV8Error::ModelPathError(_))
    ));
  }
}
