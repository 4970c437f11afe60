use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 從影像集中挑選預覽圖塊的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// 依固定間隔平均挑選，涵蓋整個影像集，維持原本順序
    Distributed,
    /// 隨機抽樣，不重複，順序隨機
    Random,
}

impl SelectionStrategy {
    pub const ALL: [Self; 2] = [Self::Distributed, Self::Random];

    /// 挑選最多 `count` 個項目
    ///
    /// 項目不足 `count` 時整批原樣回傳。
    #[must_use]
    pub fn select<T: Clone>(self, items: &[T], count: usize) -> Vec<T> {
        self.select_with(items, count, &mut rand::thread_rng())
    }

    /// 與 [`Self::select`] 相同，隨機來源由呼叫端提供
    pub fn select_with<T: Clone, R: Rng + ?Sized>(
        self,
        items: &[T],
        count: usize,
        rng: &mut R,
    ) -> Vec<T> {
        if items.len() <= count {
            return items.to_vec();
        }

        match self {
            Self::Random => items.choose_multiple(rng, count).cloned().collect(),
            Self::Distributed => {
                let step = items.len() as f64 / count as f64;
                (0..count)
                    .map(|i| items[((i as f64 * step) as usize).min(items.len() - 1)].clone())
                    .collect()
            }
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Distributed => write!(f, "平均分布"),
            Self::Random => write!(f, "隨機"),
        }
    }
}

/// 打亂順序（挑選前使用）
pub fn shuffle_in_place<T>(items: &mut [T]) {
    items.shuffle(&mut rand::thread_rng());
}
