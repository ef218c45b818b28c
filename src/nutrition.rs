// 该文件是 Shijian （食鉴） 项目的一部分。
// src/nutrition.rs - 营养成分表与检测结果汇总
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

use serde::{Serialize, Serializer, ser::SerializeMap};
use tracing::debug;

use crate::model::{DetectResult, WithLabel};

/// 单一食物的营养成分，值为带单位的展示字符串
#[derive(Debug, PartialEq, Eq)]
pub struct NutritionRecord {
  pub food: &'static str,
  pub nutrients: &'static [(&'static str, &'static str)],
}

impl Serialize for NutritionRecord {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.nutrients.len()))?;
    for (name, value) in self.nutrients {
      map.serialize_entry(name, value)?;
    }
    map.end()
  }
}

pub static NUTRITION_TABLE: &[NutritionRecord] = &[
  NutritionRecord {
    food: "apple",
    nutrients: &[
      ("Calories", "62kcal"),
      ("Sugar", "12.2g"),
      ("Protein", "0.19g"),
      ("Carbohydrates", "14.3g"),
      ("Fiber", "2g"),
      ("Fat", "0.21g"),
      ("Potassium", "95mg"),
      ("Calcium", "5mg"),
      ("Magnesium", "4.7mg"),
      ("Vitamin B-6", "0.021mg"),
    ],
  },
  NutritionRecord {
    food: "banana",
    nutrients: &[
      ("Calories", "98kcal"),
      ("Sugar", "15.8g"),
      ("Protein", "0.74g"),
      ("Carbohydrates", "21.2g"),
      ("Fiber", "1.7g"),
      ("Fat", "0.29g"),
      ("Potassium", "326mg"),
      ("Calcium", "5mg"),
      ("Magnesium", "28mg"),
      ("Vitamin A", "1µg"),
      ("Vitamin B-6", "0.209mg"),
      ("Vitamin K", "0.1µg"),
    ],
  },
  NutritionRecord {
    food: "orange",
    nutrients: &[
      ("Calories", "47kcal"),
      ("Sugar", "9.35g"),
      ("Protein", "0.94g"),
      ("Carbohydrates", "11.8g"),
      ("Fiber", "2.4g"),
      ("Fat", "0.12g"),
      ("Potassium", "181mg"),
      ("Calcium", "40mg"),
      ("Magnesium", "10mg"),
      ("Vitamin A", "11µg"),
      ("Vitamin B-6", "0.06mg"),
      ("Vitamin C", "53.2mg"),
      ("Vitamin E", "0.18mg"),
    ],
  },
];

pub fn lookup(food: &str) -> Option<&'static NutritionRecord> {
  NUTRITION_TABLE.iter().find(|record| record.food == food)
}

/// 按类别名计数的检测物体，保持首次出现的顺序
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DetectedItems {
  counts: Vec<(String, usize)>,
}

impl DetectedItems {
  pub fn tally<T: WithLabel>(result: &DetectResult<T>) -> Self {
    let mut items = Self::default();
    for item in result.iter() {
      items.add(item.kind.to_label_str());
    }
    items
  }

  pub fn add(&mut self, name: String) {
    match self.counts.iter_mut().find(|(n, _)| *n == name) {
      Some((_, count)) => *count += 1,
      None => self.counts.push((name, 1)),
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
    self.counts.iter().map(|(name, count)| (name.as_str(), *count))
  }

  /// 与营养成分表连接，没有记录的类别被丢弃
  pub fn join_nutrition(&self) -> Vec<NutritionItem> {
    self
      .iter()
      .filter_map(|(name, count)| match lookup(name) {
        Some(nutrition) => Some(NutritionItem {
          name: name.to_string(),
          count,
          nutrition,
        }),
        None => {
          debug!("营养成分表中没有 {}，忽略 {} 个检测结果", name, count);
          None
        }
      })
      .collect()
  }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct NutritionItem {
  pub name: String,
  pub count: usize,
  pub nutrition: &'static NutritionRecord,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{CocoLabel, DetectItem};

  fn detections(ids: &[u32]) -> DetectResult<CocoLabel> {
    DetectResult::from(
      ids
        .iter()
        .map(|&id| DetectItem {
          kind: CocoLabel::from_label_id(id),
          score: 0.8,
          bbox: [0.0, 0.0, 1.0, 1.0],
        })
        .collect::<Vec<_>>(),
    )
  }

  #[test]
  fn tally_counts_in_first_occurrence_order() {
    // banana, apple, car, apple, banana, apple
    let items = DetectedItems::tally(&detections(&[46, 47, 2, 47, 46, 47]));
    let counts: Vec<_> = items.iter().collect();
    assert_eq!(counts, vec![("banana", 2), ("apple", 3), ("car", 1)]);
  }

  #[test]
  fn join_drops_unlisted_foods() {
    let items = DetectedItems::tally(&detections(&[2, 47, 47, 46, 0]));
    let joined = items.join_nutrition();

    let names: Vec<_> = joined.iter().map(|i| (i.name.as_str(), i.count)).collect();
    assert_eq!(names, vec![("apple", 2), ("banana", 1)]);
    assert!(items.iter().any(|(name, count)| name == "car" && count == 1));
  }

  #[test]
  fn empty_result_joins_to_nothing() {
    let items = DetectedItems::tally(&detections(&[]));
    assert!(items.join_nutrition().is_empty());
  }

  #[test]
  fn record_serializes_in_table_order() {
    let json = serde_json::to_string(lookup("apple").unwrap()).unwrap();
    assert!(json.starts_with(r#"{"Calories":"62kcal","Sugar":"12.2g""#));
    assert!(json.ends_with(r#""Vitamin B-6":"0.021mg"}"#));
  }

  #[test]
  fn item_serializes_with_literal_record() {
    let item = NutritionItem {
      name: "orange".to_string(),
      count: 1,
      nutrition: lookup("orange").unwrap(),
    };
    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(value["name"], "orange");
    assert_eq!(value["count"], 1);
    assert_eq!(value["nutrition"]["Vitamin C"], "53.2mg");
    assert_eq!(value["nutrition"]["Vitamin A"], "11µg");
    assert_eq!(value["nutrition"].as_object().unwrap().len(), 13);
  }

  #[test]
  fn lookup_is_exact_match() {
    assert!(lookup("apple").is_some());
    assert!(lookup("Apple").is_none());
    assert!(lookup("pineapple").is_none());
  }
}
