// 该文件是 Shijian （食鉴） 项目的一部分。
// src/input.rs - 上传图像输入
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

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

const WINDOWS_DEVICE_FILES: [&str; 22] = [
  "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
  "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// 清理上传文件名，使其可以安全地作为存储键使用
///
/// 先做 NFKD 分解（`é` 变为 `e` 加组合符），再去除非 ASCII 字符与路径分隔符，
/// 空白合并为 `_`，只保留 `[A-Za-z0-9_.-]`，并去掉首尾的 `.` 与 `_`。
/// 结果可能为空字符串。
pub fn secure_filename(name: &str) -> String {
  let ascii: String = name
    .nfkd()
    .filter(char::is_ascii)
    .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
    .collect();

  let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
  let filtered: String = joined
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    .collect();
  let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');

  let stem = trimmed.split('.').next().unwrap_or_default();
  if WINDOWS_DEVICE_FILES
    .iter()
    .any(|device| device.eq_ignore_ascii_case(stem))
  {
    return format!("_{}", trimmed);
  }

  trimmed.to_string()
}

/// 单次请求使用的临时输入文件
///
/// 文件名带有随机前缀，避免并发上传同名文件时互相覆盖；
/// 未调用 [`ScratchFile::remove`] 时在析构中删除。
#[derive(Debug)]
pub struct ScratchFile {
  path: PathBuf,
  removed: bool,
}

impl ScratchFile {
  pub async fn write(dir: &Path, file_name: &str, data: &[u8]) -> std::io::Result<Self> {
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(format!("{}-{}", Uuid::new_v4().simple(), file_name));
    tokio::fs::write(&path, data).await?;
    debug!("保存上传文件: {} ({} 字节)", path.display(), data.len());

    Ok(Self {
      path,
      removed: false,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub async fn remove(mut self) -> std::io::Result<()> {
    self.removed = true;
    tokio::fs::remove_file(&self.path).await?;
    debug!("删除上传文件: {}", self.path.display());
    Ok(())
  }
}

impl Drop for ScratchFile {
  fn drop(&mut self) {
    if self.removed {
      return;
    }
    match std::fs::remove_file(&self.path) {
      Ok(()) => debug!("处理失败，清理上传文件: {}", self.path.display()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => warn!("清理上传文件失败: {}: {}", self.path.display(), e),
    }
  }
}
